use super::BucketStore;
use crate::{Acquisition, BucketLimits, BucketState, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

/// Process-local bucket store.
///
/// Each acquisition runs while holding the shard lock for its key, so two
/// callers for the same tenant are serialized and different tenants mostly
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    buckets: DashMap<String, BucketState>,
}

impl MemoryBucketStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Snapshot of a bucket, if it exists
    pub fn state(&self, key: &str) -> Option<BucketState> {
        self.buckets.get(key).map(|entry| *entry.value())
    }

    /// Number of tracked buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no bucket is tracked
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn acquire(
        &self,
        key: &str,
        limits: BucketLimits,
        cost: f64,
        now: f64,
    ) -> Result<Acquisition> {
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| BucketState::full(&limits, now));

        Ok(entry.value_mut().acquire(&limits, cost, now))
    }

    async fn evict_idle(&self, idle_for: Duration, now: f64) -> Result<usize> {
        let cutoff = now - idle_for.as_secs_f64();
        let before = self.buckets.len();
        self.buckets.retain(|_, state| state.last_refill > cutoff);
        let evicted = before.saturating_sub(self.buckets.len());

        debug!("Evicted {} idle buckets, {} remaining", evicted, self.buckets.len());
        Ok(evicted)
    }
}
