//! Error types for risk engine

use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Request failed shape validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Rate limiter error
    #[error("Rate limiter error: {0}")]
    RateLimiter(#[from] rate_limiter::RateLimitError),

    /// Signal lookup error
    #[error("Lookup error: {0}")]
    Lookup(#[from] signal_lookups::LookupError),

    /// Redis connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Check recorder failed
    #[error("Recorder error: {0}")]
    Recorder(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
