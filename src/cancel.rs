/*!
 * Cancellation Tokens
 *
 * Externally delivered interruption of a sleeping thread, the userland
 * analog of signal delivery. A token only marks; sleepers observe the mark
 * at their next wakeup, so pair `cancel` with a wake on the channel (or use
 * `ChannelWaitRegistry::interrupt`, which does both).
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag shared between a sleeper and its canceller
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled
    ///
    /// Does not wake anyone by itself; a sleeper holding this token returns
    /// `SleepError::Cancelled` the next time it wakes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether the token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
