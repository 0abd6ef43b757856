/*!
 * Channel Hash Table
 *
 * Open-chaining buckets from channel to wait node. The whole structure,
 * waiter counts included, is guarded by one coarse mutex owned by the
 * registry; every operation here assumes that lock is held and finishes in
 * O(1) amortized time, so the lock is never held across a blocking wait.
 *
 * Bucket count is a power of two and the index is an ahash of the channel
 * masked by `len - 1`. The array doubles when chains get long, up to a hard
 * ceiling.
 */

use crate::limits::{BUCKET_LOAD_FACTOR, MAX_WAIT_BUCKETS};
use crate::node::WaitNode;
use std::hash::{Hash, Hasher};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) struct WaitTable<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    buckets: Vec<Vec<Arc<WaitNode<K>>>>,
    mask: usize,
    nodes: usize,
}

impl<K> WaitTable<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    pub(crate) fn new(initial_buckets: usize) -> Self {
        let count = initial_buckets
            .next_power_of_two()
            .clamp(1, MAX_WAIT_BUCKETS);
        Self {
            buckets: (0..count).map(|_| Vec::new()).collect(),
            mask: count - 1,
            nodes: 0,
        }
    }

    /// Hash a channel to its bucket index
    #[inline]
    fn bucket_index(&self, channel: &K) -> usize {
        let mut hasher = ahash::AHasher::default();
        channel.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    /// Node for `channel`, if any thread is attached to it
    pub(crate) fn find(&self, channel: K) -> Option<&Arc<WaitNode<K>>> {
        self.buckets[self.bucket_index(&channel)]
            .iter()
            .find(|node| node.channel == channel)
    }

    /// Find or create the node for `channel` and attach one waiter to it
    pub(crate) fn attach(&mut self, channel: K) -> Arc<WaitNode<K>> {
        self.maybe_grow();

        let idx = self.bucket_index(&channel);
        if let Some(node) = self.buckets[idx].iter().find(|n| n.channel == channel) {
            node.waiters.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(node);
        }

        let node = Arc::new(WaitNode::new(channel));
        node.waiters.store(1, Ordering::Relaxed);
        self.buckets[idx].push(Arc::clone(&node));
        self.nodes += 1;
        node
    }

    /// Detach one waiter from `channel`, removing the node when the last
    /// one leaves
    ///
    /// Returns `false` when no node exists for the channel, which indicates
    /// a detach without a matching attach.
    pub(crate) fn detach(&mut self, channel: K) -> bool {
        let idx = self.bucket_index(&channel);
        let bucket = &mut self.buckets[idx];
        let Some(pos) = bucket.iter().position(|n| n.channel == channel) else {
            return false;
        };

        let remaining = bucket[pos].waiters.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            bucket.swap_remove(pos);
            self.nodes -= 1;
        }
        true
    }

    /// Number of live nodes (channels with at least one sleeper)
    pub(crate) fn len(&self) -> usize {
        self.nodes
    }

    /// Remove and return every node; used at registry teardown
    pub(crate) fn drain(&mut self) -> Vec<Arc<WaitNode<K>>> {
        self.nodes = 0;
        self.buckets
            .iter_mut()
            .flat_map(std::mem::take)
            .collect()
    }

    /// Double the bucket array once chains exceed the load factor
    fn maybe_grow(&mut self) {
        let capacity = self.buckets.len();
        if self.nodes < capacity * BUCKET_LOAD_FACTOR || capacity >= MAX_WAIT_BUCKETS {
            return;
        }

        let grown = capacity * 2;
        self.mask = grown - 1;
        let old: Vec<_> = self.buckets.iter_mut().flat_map(std::mem::take).collect();
        self.buckets.resize_with(grown, Vec::new);
        for node in old {
            let idx = self.bucket_index(&node.channel);
            self.buckets[idx].push(node);
        }
    }
}
