//! Error types for the rate limiter

use thiserror::Error;

/// Rate limiter error
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Capacity or refill rate outside the accepted range
    #[error("Invalid limits: {0}")]
    InvalidLimits(String),

    /// Acquisition cost that can never be satisfied
    #[error("Invalid cost {cost}: {reason}")]
    InvalidCost {
        /// Requested cost
        cost: f64,
        /// Why the cost was rejected
        reason: String,
    },

    /// Backing store failed or returned garbage
    #[error("Bucket store error: {0}")]
    Store(String),

    /// Redis round trip failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store unreachable and the limiter is configured to fail closed
    #[error("Rate limiter unavailable: {0}")]
    Unavailable(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, RateLimitError>;
