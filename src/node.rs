/*!
 * Wait Nodes
 *
 * Per-channel shared state: how many threads are attached, plus the condvar
 * rendezvous they block on. A node exists in the table exactly as long as
 * its waiter count is above zero.
 */

use parking_lot::{Condvar, Mutex};
use std::hash::Hash;
use std::sync::atomic::AtomicUsize;

/// Pending wakes for one channel, guarded by the node's rendezvous mutex
#[derive(Debug, Default)]
pub(crate) struct WakeState {
    /// Undelivered `wake_one` tickets; never exceeds the attached waiter
    /// count, and each is consumed by exactly one sleeper
    pub(crate) tickets: usize,
    /// Bumped by every `wake_all`; a sleeper returns once this moves past
    /// the value it captured at attach time
    pub(crate) broadcasts: u64,
}

/// Shared state for every thread sleeping on one channel
pub(crate) struct WaitNode<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    /// The channel this node serves; compared, hashed, never dereferenced
    pub(crate) channel: K,
    /// Attached waiter count; mutated only under the registry table lock
    pub(crate) waiters: AtomicUsize,
    /// Rendezvous state, distinct from both the table lock and the
    /// caller's external lock; held only briefly
    pub(crate) state: Mutex<WakeState>,
    pub(crate) condvar: Condvar,
}

impl<K> WaitNode<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    pub(crate) fn new(channel: K) -> Self {
        Self {
            channel,
            waiters: AtomicUsize::new(0),
            state: Mutex::new(WakeState::default()),
            condvar: Condvar::new(),
        }
    }

    /// Bump the broadcast generation and wake every sleeper on this node
    pub(crate) fn broadcast(&self) {
        let mut state = self.state.lock();
        state.broadcasts = state.broadcasts.wrapping_add(1);
        self.condvar.notify_all();
    }
}
