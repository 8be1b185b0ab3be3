//! Error types for signal lookups

use thiserror::Error;

/// Signal lookup error
#[derive(Error, Debug)]
pub enum LookupError {
    /// Source answered but has nothing usable
    #[error("Lookup source unavailable: {0}")]
    Unavailable(String),

    /// Input could not be looked up
    #[error("Invalid lookup input: {0}")]
    InvalidInput(String),

    /// Redis round trip failed
    #[error("Redis lookup failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type
pub type Result<T> = std::result::Result<T, LookupError>;
