/*!
 * Channel Wait Registry
 *
 * The sleep/wakeup protocol. A sleeper attaches to its channel's wait node,
 * releases the caller-supplied lock, blocks on the node's condvar, then
 * re-acquires the lock and detaches, in that order, on every exit path.
 * Wakers look the node up and deliver a ticket (`wake_one`) or bump the
 * broadcast generation (`wake_all`) while still holding the table lock, so
 * a node can never be destroyed between lookup and signal.
 *
 * # No lost wakeups
 *
 * The sleeper captures the node's broadcast generation while the caller's
 * lock is still held. Any wake issued after that point changes state the
 * wait loop rechecks, so the window between releasing the caller's lock and
 * entering the condvar wait cannot swallow a wake.
 *
 * # Lock order
 *
 * `external lock -> table lock -> node state`. No path acquires in any
 * other order.
 */

use crate::cancel::CancelToken;
use crate::config::{RegistryConfig, TeardownPolicy};
use crate::node::WaitNode;
use crate::table::WaitTable;
use crate::traits::{ChannelLock, WakeResult};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Result type for sleep operations
pub type SleepResult = Result<SleepOutcome, SleepError>;

/// How a completed sleep ended
///
/// Both variants are normal returns; a timeout is not a failure. `Woken`
/// promises only that a wake targeted this channel; callers re-check their
/// own predicate, as with any condition variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// A `wake_one` or `wake_all` on the channel reached this sleeper
    Woken,
    /// The timeout elapsed before any wake arrived
    TimedOut,
}

/// Sleep operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SleepError {
    #[error("sleep was cancelled")]
    Cancelled,
}

/// Registry of sleep/wakeup channels
///
/// An explicitly constructed value: share it by reference or `Arc`, or
/// create several independent registries side by side. Dropping the
/// registry applies the configured [`TeardownPolicy`].
///
/// # Type Parameters
///
/// - `K`: Channel type; any cheap hashable identifier (e.g. `u64` sequence
///   numbers, `(Pid, Resource)` pairs)
///
/// # Examples
///
/// ```
/// use sleepq::ChannelWaitRegistry;
/// use parking_lot::Mutex;
/// use std::time::Duration;
///
/// let registry = ChannelWaitRegistry::<u64>::with_defaults();
/// let lock = Mutex::new(());
///
/// let mut guard = lock.lock();
/// let outcome = registry.sleep_on(42, &mut guard, Some(Duration::from_millis(10)));
/// // Nobody woke channel 42, so the sleep timed out; the lock is held again.
/// assert_eq!(outcome, Ok(sleepq::SleepOutcome::TimedOut));
/// ```
pub struct ChannelWaitRegistry<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    table: Mutex<WaitTable<K>>,
    teardown: TeardownPolicy,
}

impl<K> ChannelWaitRegistry<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    /// Create a registry with the given configuration
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            table: Mutex::new(WaitTable::new(config.initial_buckets)),
            teardown: config.teardown,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RegistryConfig::default())
    }

    /// Block on `channel` until woken, with the caller's lock released for
    /// the duration of the wait
    ///
    /// The caller must hold `guard`, the lock protecting the predicate it
    /// is waiting on. It is released while blocked and re-acquired before
    /// this returns, on every path.
    ///
    /// `timeout` of `None` or zero means wait indefinitely; a positive
    /// duration bounds the wait against the monotonic clock.
    #[inline]
    pub fn sleep_on<G: ChannelLock>(
        &self,
        channel: K,
        guard: &mut G,
        timeout: Option<Duration>,
    ) -> SleepResult {
        self.sleep_on_cancellable(channel, guard, timeout, None)
    }

    /// `sleep_on` with an additional cancellation token
    ///
    /// Cancellation is observed at wakeup points: once `token` is marked
    /// and the sleeper wakes for any reason, it returns
    /// `Err(SleepError::Cancelled)`, after the lock is re-acquired and the
    /// waiter detached, like every other exit. A cancelled sleeper does not
    /// consume a `wake_one` ticket.
    pub fn sleep_on_cancellable<G: ChannelLock>(
        &self,
        channel: K,
        guard: &mut G,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> SleepResult {
        // Zero duration means no timeout, like the classic tsleep contract
        let timeout = timeout.filter(|d| !d.is_zero());
        let deadline = timeout.map(|d| Instant::now() + d);

        // Detaches on drop: one attach, one detach, whatever the exit path
        let attached = Attached::new(self, channel);

        // Capture the broadcast baseline while the caller's lock is still
        // held; every wake issued after this point is observable below
        let baseline = attached.node.state.lock().broadcasts;

        let outcome = guard.unlocked(|| attached.block(baseline, deadline, cancel));
        // Caller's lock is held again; `attached` drops here and detaches
        outcome
    }

    /// Wake every sleeper on `channel`
    ///
    /// A no-op when nobody is sleeping there: semantically "no one was
    /// listening", not an error.
    pub fn wake_all(&self, channel: K) -> WakeResult {
        let table = self.table.lock();
        let Some(node) = table.find(channel) else {
            return WakeResult::NoWaiters;
        };

        let sleeping = node.waiters.load(Ordering::Relaxed);
        node.broadcast();
        WakeResult::Woken(sleeping)
    }

    /// Wake at most one sleeper on `channel`
    ///
    /// Which sleeper wins is unspecified; no FIFO or priority order is
    /// maintained. A no-op when nobody is sleeping there.
    pub fn wake_one(&self, channel: K) -> WakeResult {
        let table = self.table.lock();
        let Some(node) = table.find(channel) else {
            return WakeResult::NoWaiters;
        };

        let sleeping = node.waiters.load(Ordering::Relaxed);
        let mut state = node.state.lock();
        // Tickets never outnumber sleepers; a surplus wake is dropped here
        // the same way a wake on an empty channel is
        if state.tickets < sleeping {
            state.tickets += 1;
        }
        node.condvar.notify_one();
        drop(state);

        WakeResult::Woken(1)
    }

    /// Mark `token` cancelled and broadcast `channel` so its sleepers
    /// observe the mark promptly
    ///
    /// Sleepers holding other tokens treat the broadcast as a wake.
    pub fn interrupt(&self, channel: K, token: &CancelToken) -> WakeResult {
        token.cancel();
        self.wake_all(channel)
    }

    /// Number of threads currently sleeping on `channel` (diagnostics)
    pub fn waiter_count(&self, channel: K) -> usize {
        self.table
            .lock()
            .find(channel)
            .map(|node| node.waiters.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of channels with at least one sleeper (diagnostics)
    pub fn node_count(&self) -> usize {
        self.table.lock().len()
    }
}

impl<K> Drop for ChannelWaitRegistry<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let leftovers = self.table.get_mut().drain();
        if leftovers.is_empty() {
            return;
        }

        match self.teardown {
            TeardownPolicy::AssertEmpty => {
                debug_assert!(
                    false,
                    "registry dropped with {} wait nodes still live",
                    leftovers.len()
                );
                log::error!(
                    "registry dropped with {} wait nodes still live",
                    leftovers.len()
                );
            }
            TeardownPolicy::WakeRemaining => {
                log::warn!(
                    "waking {} channels still occupied at registry teardown",
                    leftovers.len()
                );
                for node in leftovers {
                    node.broadcast();
                }
            }
        }
    }
}

/// One attached waiter, alive from lookup-or-create until detach
///
/// Holding this keeps the node referenced so it cannot be destroyed under
/// a blocked thread; dropping it performs the matching detach, removing the
/// node when the last waiter leaves.
struct Attached<'r, K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    registry: &'r ChannelWaitRegistry<K>,
    node: Arc<WaitNode<K>>,
}

impl<'r, K> Attached<'r, K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    fn new(registry: &'r ChannelWaitRegistry<K>, channel: K) -> Self {
        let node = registry.table.lock().attach(channel);
        Self { registry, node }
    }

    /// The blocked state: wait on the node's condvar until a wake, the
    /// deadline, or cancellation ends it
    ///
    /// Runs with the caller's external lock released. Spurious condvar
    /// wakeups loop back into the wait because neither counter moved.
    fn block(
        &self,
        baseline: u64,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> SleepResult {
        let node = &self.node;
        let mut state = node.state.lock();

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(SleepError::Cancelled);
            }
            if state.broadcasts != baseline {
                return Ok(SleepOutcome::Woken);
            }
            if state.tickets > 0 {
                state.tickets -= 1;
                return Ok(SleepOutcome::Woken);
            }

            match deadline {
                Some(deadline) => {
                    if node.condvar.wait_until(&mut state, deadline).timed_out() {
                        // A wake that raced the timeout still wins
                        if state.broadcasts != baseline {
                            return Ok(SleepOutcome::Woken);
                        }
                        if state.tickets > 0 {
                            state.tickets -= 1;
                            return Ok(SleepOutcome::Woken);
                        }
                        if cancel.is_some_and(CancelToken::is_cancelled) {
                            return Err(SleepError::Cancelled);
                        }
                        return Ok(SleepOutcome::TimedOut);
                    }
                }
                None => node.condvar.wait(&mut state),
            }
        }
    }
}

impl<K> Drop for Attached<'_, K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let mut table = self.registry.table.lock();
        if !table.detach(self.node.channel) {
            debug_assert!(false, "detach without a matching wait node");
            log::warn!("wait node missing at detach; unbalanced attach/detach");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    fn registry() -> Arc<ChannelWaitRegistry<u64>> {
        Arc::new(ChannelWaitRegistry::new(RegistryConfig::compact()))
    }

    #[test]
    fn test_sleep_then_wake_one() {
        let registry = registry();
        let lock = Arc::new(Mutex::new(()));

        let r = registry.clone();
        let l = lock.clone();
        let handle = thread::spawn(move || {
            let mut guard = l.lock();
            r.sleep_on(42, &mut guard, Some(Duration::from_secs(5)))
        });

        while registry.waiter_count(42) == 0 {
            thread::yield_now();
        }
        assert!(registry.wake_one(42).is_woken());

        assert_eq!(handle.join().unwrap(), Ok(SleepOutcome::Woken));
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_sleep_timeout() {
        let registry = registry();
        let lock = Mutex::new(());

        let start = Instant::now();
        let mut guard = lock.lock();
        let outcome = registry.sleep_on(7, &mut guard, Some(Duration::from_millis(50)));

        assert_eq!(outcome, Ok(SleepOutcome::TimedOut));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_zero_timeout_means_indefinite() {
        let registry = registry();
        let lock = Arc::new(Mutex::new(()));

        let r = registry.clone();
        let l = lock.clone();
        let handle = thread::spawn(move || {
            let mut guard = l.lock();
            // Zero is "no timeout", so this must block until woken rather
            // than return TimedOut immediately
            r.sleep_on(9, &mut guard, Some(Duration::ZERO))
        });

        while registry.waiter_count(9) == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(30));
        registry.wake_all(9);

        assert_eq!(handle.join().unwrap(), Ok(SleepOutcome::Woken));
    }

    #[test]
    fn test_wake_without_sleepers_is_noop() {
        let registry = registry();

        assert_eq!(registry.wake_all(123), WakeResult::NoWaiters);
        assert_eq!(registry.wake_one(123), WakeResult::NoWaiters);
        // A wake on an idle channel must not materialize a node
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_cancelled_sleeper_reports_cancelled() {
        let registry = registry();
        let lock = Arc::new(Mutex::new(()));
        let token = CancelToken::new();

        let r = registry.clone();
        let l = lock.clone();
        let t = token.clone();
        let handle = thread::spawn(move || {
            let mut guard = l.lock();
            r.sleep_on_cancellable(5, &mut guard, Some(Duration::from_secs(5)), Some(&t))
        });

        while registry.waiter_count(5) == 0 {
            thread::yield_now();
        }
        registry.interrupt(5, &token);

        assert_eq!(handle.join().unwrap(), Err(SleepError::Cancelled));
        assert_eq!(registry.node_count(), 0);
    }

    #[test]
    fn test_teardown_wake_remaining_policy_builds() {
        // Exercises the non-default policy path on an empty registry
        let registry = ChannelWaitRegistry::<u64>::new(RegistryConfig {
            initial_buckets: 4,
            teardown: TeardownPolicy::WakeRemaining,
        });
        assert_eq!(registry.node_count(), 0);
    }
}
