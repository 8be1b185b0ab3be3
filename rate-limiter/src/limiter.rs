//! Tenant-scoped admission gate

use crate::{BucketLimits, BucketStore, Clock, RateLimitError, Result, SystemClock};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What to do when the bucket store cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Deny the request and report the limiter as unavailable
    #[default]
    Closed,
    /// Admit the request without charging quota
    Open,
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Default burst size (token bucket capacity)
    pub default_capacity: f64,

    /// Default token refill rate (tokens per second)
    pub default_refill_rate: f64,

    /// Behaviour when the store is unreachable
    pub failure_policy: FailurePolicy,

    /// Buckets idle for longer than this may be evicted
    pub idle_eviction: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            default_capacity: 60.0,
            default_refill_rate: 1.0, // 60 requests per minute sustained
            failure_policy: FailurePolicy::Closed,
            idle_eviction: Duration::from_secs(3600),
        }
    }
}

/// Rate limiter result
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitResult {
    /// Request allowed
    Allowed {
        /// Tokens left after this request
        remaining: f64,
    },

    /// Request denied (bucket exhausted)
    Denied {
        /// Wait before enough tokens are available
        retry_after: Duration,
        /// Tokens currently in the bucket
        remaining: f64,
    },

    /// Store unreachable, request admitted under fail-open policy
    FailedOpen,
}

impl RateLimitResult {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. } | RateLimitResult::FailedOpen)
    }

    /// Known remaining quota, if any
    pub fn remaining(&self) -> Option<f64> {
        match self {
            RateLimitResult::Allowed { remaining } | RateLimitResult::Denied { remaining, .. } => {
                Some(*remaining)
            }
            RateLimitResult::FailedOpen => None,
        }
    }
}

/// Per-tenant token bucket rate limiter
pub struct TenantRateLimiter {
    /// Configuration
    config: RateLimiterConfig,

    /// Global limits applied to tenants without an override
    defaults: BucketLimits,

    /// Administrative per-tenant overrides
    overrides: DashMap<String, BucketLimits>,

    /// Shared bucket state
    store: Arc<dyn BucketStore>,

    clock: Arc<dyn Clock>,
}

impl TenantRateLimiter {
    /// Create new rate limiter
    pub fn new(config: RateLimiterConfig, store: Arc<dyn BucketStore>) -> Result<Self> {
        let defaults = BucketLimits::new(config.default_capacity, config.default_refill_rate)?;

        Ok(Self {
            config,
            defaults,
            overrides: DashMap::new(),
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Limits that apply to `tenant`
    pub fn limits_for(&self, tenant: &str) -> BucketLimits {
        self.overrides
            .get(tenant)
            .map(|limits| *limits.value())
            .unwrap_or(self.defaults)
    }

    /// Override capacity and refill rate for one tenant.
    ///
    /// Takes effect from the next acquisition; tokens already in the bucket
    /// are clamped to the new capacity when it refills.
    pub fn configure_limits(&self, tenant: &str, capacity: f64, refill_rate: f64) -> Result<()> {
        let limits = BucketLimits::new(capacity, refill_rate)?;
        self.overrides.insert(tenant.to_string(), limits);
        info!(
            "Rate limit override for {}: capacity={} refill={}/s",
            tenant, capacity, refill_rate
        );
        Ok(())
    }

    /// Remove a tenant override, returning to the global limits
    pub fn clear_limits(&self, tenant: &str) -> bool {
        self.overrides.remove(tenant).is_some()
    }

    /// Try to take `cost` tokens from the tenant's bucket.
    ///
    /// Tokens are charged on attempt; nothing is refunded if the caller later
    /// abandons the request.
    pub async fn try_acquire(&self, tenant: &str, cost: f64) -> Result<RateLimitResult> {
        let limits = self.limits_for(tenant);
        limits.check_cost(cost)?;

        let now = self.clock.now_secs();
        match self.store.acquire(tenant, limits, cost, now).await {
            Ok(acquisition) if acquisition.allowed => {
                debug!("Tenant {} admitted, {:.2} tokens left", tenant, acquisition.remaining);
                Ok(RateLimitResult::Allowed {
                    remaining: acquisition.remaining,
                })
            }
            Ok(acquisition) => {
                warn!(
                    "Tenant rate limit exceeded: {} (retry after {:?})",
                    tenant, acquisition.retry_after
                );
                Ok(RateLimitResult::Denied {
                    retry_after: acquisition.retry_after,
                    remaining: acquisition.remaining,
                })
            }
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Closed => {
                    warn!("Bucket store unavailable for {}, failing closed: {}", tenant, e);
                    Err(RateLimitError::Unavailable(e.to_string()))
                }
                FailurePolicy::Open => {
                    warn!("Bucket store unavailable for {}, failing open: {}", tenant, e);
                    Ok(RateLimitResult::FailedOpen)
                }
            },
        }
    }

    /// Unit-cost acquisition
    pub async fn try_acquire_one(&self, tenant: &str) -> Result<RateLimitResult> {
        self.try_acquire(tenant, 1.0).await
    }

    /// Cleanup idle buckets
    pub async fn cleanup(&self) -> Result<usize> {
        let evicted = self
            .store
            .evict_idle(self.config.idle_eviction, self.clock.now_secs())
            .await?;
        if evicted > 0 {
            info!("Rate limiter cleanup: {} idle buckets evicted", evicted);
        }
        Ok(evicted)
    }

    /// Start cleanup task
    pub fn start_cleanup_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.cleanup().await {
                    warn!("Rate limiter cleanup failed: {}", e);
                }
            }
        })
    }
}
