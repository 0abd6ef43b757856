/*!
 * Wake Results and the External Lock Seam
 *
 * `sleep_on` blocks with a caller-supplied lock released and re-acquires it
 * before returning. `ChannelLock` is that seam: any guard that can release
 * itself for the duration of a closure and re-acquire on the way out,
 * including during unwinding.
 */

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Woke up to N sleepers (N >= 1)
    Woken(usize),
    /// No sleepers on the channel
    NoWaiters,
}

impl WakeResult {
    /// Check if any sleepers were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Number of woken sleepers (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// A held lock that can be released for the duration of a closure
///
/// Implementations must re-acquire the lock before `unlocked` returns, on
/// both the normal and the unwinding path. The `parking_lot` guards satisfy
/// this via their scoped `unlocked` methods.
pub trait ChannelLock {
    /// Release the lock, run `f`, re-acquire the lock
    fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R;
}

impl<T: ?Sized> ChannelLock for parking_lot::MutexGuard<'_, T> {
    fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        parking_lot::MutexGuard::unlocked(self, f)
    }
}

impl<T: ?Sized> ChannelLock for parking_lot::RwLockWriteGuard<'_, T> {
    fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        parking_lot::RwLockWriteGuard::unlocked(self, f)
    }
}
