//! Per-tenant rate limiting
//!
//! Continuous token bucket admission control shared by every caller of the
//! scoring API:
//! - Capacity and refill rate configured globally, overridable per tenant
//! - Atomic read-refill-compare-write against a pluggable [`BucketStore`]
//! - In-memory store (per-key lock) and Redis store (server-side script)
//! - Fail-closed or fail-open behaviour when the store is unreachable
//!
//! # Usage
//!
//! ```rust,no_run
//! use rate_limiter::{MemoryBucketStore, RateLimiterConfig, TenantRateLimiter};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), rate_limiter::RateLimitError> {
//! let store = Arc::new(MemoryBucketStore::new());
//! let limiter = TenantRateLimiter::new(RateLimiterConfig::default(), store)?;
//!
//! limiter.configure_limits("org-42", 5.0, 1.0)?;
//! let result = limiter.try_acquire("org-42", 1.0).await?;
//! assert!(result.is_allowed());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
pub mod clock;
pub mod error;
pub mod limiter;
pub mod store;

pub use bucket::{Acquisition, BucketLimits, BucketState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RateLimitError, Result};
pub use limiter::{FailurePolicy, RateLimitResult, RateLimiterConfig, TenantRateLimiter};
pub use store::{BucketStore, MemoryBucketStore, RedisBucketStore};
