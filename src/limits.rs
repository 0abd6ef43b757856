/*!
 * Registry Limits and Constants
 *
 * Centralized tunables for the channel wait table.
 */

/// Initial bucket count for the wait table (power of 2 for fast modulo)
/// Sized for a few hundred concurrently active channels before growth
pub const DEFAULT_WAIT_BUCKETS: usize = 64;

/// Nodes per bucket before the table doubles its bucket array
/// Chains stay short enough that lookups under the table lock remain O(1)
pub const BUCKET_LOAD_FACTOR: usize = 4;

/// Hard ceiling on bucket-array growth
/// Caps rehash cost and memory for pathological channel churn
pub const MAX_WAIT_BUCKETS: usize = 65_536;
