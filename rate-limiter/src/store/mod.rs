//! Bucket stores
//!
//! A store owns the `(tokens, last_refill)` pairs and must run the whole
//! read-refill-compare-write cycle as one atomic step per key.

mod memory;
mod redis_store;

pub use self::memory::MemoryBucketStore;
pub use self::redis_store::RedisBucketStore;

use crate::{Acquisition, BucketLimits, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Shared storage for token buckets
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Atomically refill the bucket for `key` up to `now` and try to take `cost` tokens.
    ///
    /// A missing bucket starts full.
    async fn acquire(
        &self,
        key: &str,
        limits: BucketLimits,
        cost: f64,
        now: f64,
    ) -> Result<Acquisition>;

    /// Drop buckets untouched for `idle_for`. Returns how many were removed.
    ///
    /// Stores that expire keys on their own return zero.
    async fn evict_idle(&self, _idle_for: Duration, _now: f64) -> Result<usize> {
        Ok(0)
    }
}
