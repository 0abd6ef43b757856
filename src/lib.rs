/*!
 * Sleep/Wakeup Channels
 *
 * Kernel-style sleep/wakeup primitives reimplemented on userland condition
 * variables. Threads block on an opaque channel value; other threads wake
 * one or all of the sleepers by naming the same channel.
 *
 * # Architecture
 *
 * A [`ChannelWaitRegistry`] maps each channel to a reference-counted wait
 * node (waiter count + condvar rendezvous), stored in hash buckets behind a
 * single coarse table lock. Nodes are created on first sleep and destroyed
 * when the last waiter detaches.
 *
 * # Guarantees
 *
 * - A wake issued after a sleeper has attached is never lost.
 * - Waking a channel nobody sleeps on is a no-op, not an error.
 * - The caller's lock is re-acquired and the waiter detached on every exit
 *   path: wake, timeout, cancellation, and panic.
 *
 * No ordering is guaranteed among sleepers on the same channel; `wake_one`
 * may pick any of them.
 */

mod cancel;
mod config;
mod limits;
mod node;
mod registry;
mod table;
mod traits;

// Re-export public API
pub use cancel::CancelToken;
pub use config::{RegistryConfig, TeardownPolicy};
pub use registry::{ChannelWaitRegistry, SleepError, SleepOutcome, SleepResult};
pub use traits::{ChannelLock, WakeResult};
