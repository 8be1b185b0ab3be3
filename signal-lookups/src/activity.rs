//! Per-tenant IP activity counting for repeat-source detection

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Counts how often an IP was seen for a tenant inside a rolling window.
#[async_trait]
pub trait IpActivityCounter: Send + Sync {
    /// Requests recorded for `(tenant, ip)` within the last `window`.
    async fn count_recent(&self, tenant: &str, ip: IpAddr, window: std::time::Duration)
        -> Result<u64>;

    /// Record one request from `ip` on behalf of `tenant`.
    async fn record(&self, tenant: &str, ip: IpAddr) -> Result<()>;

    /// Drop sources with no request inside retention. Returns how many were removed.
    async fn evict_idle(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Sliding-window counter kept in process memory
pub struct MemoryIpActivity {
    // Map: (tenant, ip) -> request timestamps
    seen: Arc<DashMap<(String, IpAddr), Vec<DateTime<Utc>>>>,
    retention: Duration,
}

impl MemoryIpActivity {
    /// Timestamps older than `retention` are discarded on the next touch.
    pub fn new(retention: std::time::Duration) -> Self {
        Self {
            seen: Arc::new(DashMap::new()),
            retention: Duration::from_std(retention).unwrap_or_else(|_| Duration::hours(24)),
        }
    }

    /// Record a request at an explicit time
    pub fn record_at(&self, tenant: &str, ip: IpAddr, at: DateTime<Utc>) {
        let cutoff = at - self.retention;
        let mut entry = self.seen.entry((tenant.to_string(), ip)).or_default();
        entry.retain(|ts| *ts >= cutoff);
        entry.push(at);
    }

    /// Count requests within `window` ending at `now`
    pub fn count_at(&self, tenant: &str, ip: IpAddr, window: Duration, now: DateTime<Utc>) -> u64 {
        let window_start = now - window;
        self.seen
            .get(&(tenant.to_string(), ip))
            .map(|entry| entry.iter().filter(|ts| **ts >= window_start).count() as u64)
            .unwrap_or(0)
    }

    /// Remove `(tenant, ip)` pairs whose newest request is older than retention
    pub fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.seen.len();
        self.seen.retain(|_, timestamps| {
            timestamps.retain(|ts| *ts >= cutoff);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.seen.len())
    }

    /// Get total number of tracked (tenant, ip) pairs
    pub fn tracked_sources(&self) -> usize {
        self.seen.len()
    }
}

#[async_trait]
impl IpActivityCounter for MemoryIpActivity {
    async fn count_recent(
        &self,
        tenant: &str,
        ip: IpAddr,
        window: std::time::Duration,
    ) -> Result<u64> {
        let window = Duration::from_std(window).unwrap_or(self.retention);
        Ok(self.count_at(tenant, ip, window, Utc::now()))
    }

    async fn record(&self, tenant: &str, ip: IpAddr) -> Result<()> {
        self.record_at(tenant, ip, Utc::now());
        Ok(())
    }

    async fn evict_idle(&self) -> Result<usize> {
        Ok(self.evict_idle_at(Utc::now()))
    }
}
