//! Token bucket state and refill arithmetic

use crate::{RateLimitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bucket parameters for one tenant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketLimits {
    /// Maximum tokens (burst size)
    pub capacity: f64,

    /// Token refill rate (per second)
    pub refill_rate: f64,
}

impl BucketLimits {
    /// Validate and build limits. Capacity must admit at least one unit-cost request.
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self> {
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(RateLimitError::InvalidLimits(format!(
                "capacity must be a finite value >= 1, got {}",
                capacity
            )));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(RateLimitError::InvalidLimits(format!(
                "refill rate must be a finite positive value, got {}",
                refill_rate
            )));
        }
        Ok(Self {
            capacity,
            refill_rate,
        })
    }

    /// Check that `cost` can ever be satisfied by this bucket.
    pub fn check_cost(&self, cost: f64) -> Result<()> {
        if !cost.is_finite() || cost <= 0.0 {
            return Err(RateLimitError::InvalidCost {
                cost,
                reason: "cost must be a finite positive value".to_string(),
            });
        }
        if cost > self.capacity {
            return Err(RateLimitError::InvalidCost {
                cost,
                reason: format!("cost exceeds bucket capacity {}", self.capacity),
            });
        }
        Ok(())
    }
}

/// Outcome of one read-refill-compare-write cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acquisition {
    /// Whether the tokens were taken
    pub allowed: bool,

    /// Tokens left in the bucket after the cycle
    pub remaining: f64,

    /// Wait until `cost` tokens are available (zero when allowed)
    pub retry_after: Duration,
}

impl Acquisition {
    /// Derive the acquisition from the post-cycle token count.
    pub fn from_remaining(allowed: bool, remaining: f64, cost: f64, limits: &BucketLimits) -> Self {
        let retry_after = if allowed {
            Duration::ZERO
        } else {
            let deficit = (cost - remaining).max(0.0);
            // Saturate: very slow refill rates overflow `Duration`
            Duration::try_from_secs_f64(deficit / limits.refill_rate).unwrap_or(Duration::MAX)
        };
        Self {
            allowed,
            remaining,
            retry_after,
        }
    }
}

/// Persisted bucket state: `(tokens, last_refill)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    /// Current token count
    pub tokens: f64,

    /// Last refill timestamp (fractional Unix seconds)
    pub last_refill: f64,
}

impl BucketState {
    /// Fresh bucket at full capacity.
    pub fn full(limits: &BucketLimits, now: f64) -> Self {
        Self {
            tokens: limits.capacity,
            last_refill: now,
        }
    }

    /// Refill for the elapsed time, then take `cost` tokens if available.
    ///
    /// The state is updated in both cases; a denied acquisition still
    /// persists the refill.
    pub fn acquire(&mut self, limits: &BucketLimits, cost: f64, now: f64) -> Acquisition {
        let elapsed = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed * limits.refill_rate).min(limits.capacity);
        // Never move backwards if two processes disagree slightly on time.
        self.last_refill = self.last_refill.max(now);

        let allowed = self.tokens >= cost;
        if allowed {
            self.tokens -= cost;
        }

        Acquisition::from_remaining(allowed, self.tokens, cost, limits)
    }
}
