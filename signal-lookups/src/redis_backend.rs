//! Redis-backed signal sets and tenant blacklists

use crate::blacklist::TenantBlacklist;
use crate::error::Result;
use crate::sets::SignalSetLookup;
use crate::types::{normalize_value, BlacklistCategory, SignalSet};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Blacklist key prefix
pub const BLACKLIST_PREFIX: &str = "blacklist";

/// Membership sets kept in Redis (`SISMEMBER` against the set's key).
#[derive(Clone)]
pub struct RedisSignalSets {
    redis: ConnectionManager,
}

impl RedisSignalSets {
    /// Wrap an existing connection manager
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SignalSetLookup for RedisSignalSets {
    async fn contains(&self, set: SignalSet, member: &str) -> Result<bool> {
        let member = set.normalize(member);
        let found: bool = self.redis.clone().sismember(set.as_str(), member).await?;
        Ok(found)
    }
}

/// Tenant blacklists stored as one Redis set per tenant and category.
#[derive(Clone)]
pub struct RedisBlacklist {
    redis: ConnectionManager,
}

impl RedisBlacklist {
    /// Wrap an existing connection manager
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Set key holding `tenant`'s entries for `category`
    pub fn key(tenant: &str, category: BlacklistCategory) -> String {
        format!("{}:{}:{}", BLACKLIST_PREFIX, tenant, category.as_str())
    }
}

#[async_trait]
impl TenantBlacklist for RedisBlacklist {
    async fn is_blacklisted(
        &self,
        tenant: &str,
        category: BlacklistCategory,
        value: &str,
    ) -> Result<bool> {
        let found: bool = self
            .redis
            .clone()
            .sismember(Self::key(tenant, category), normalize_value(value))
            .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_key_is_tenant_scoped() {
        assert_eq!(
            RedisBlacklist::key("org-a", BlacklistCategory::EmailDomain),
            "blacklist:org-a:email_domain"
        );
        assert_ne!(
            RedisBlacklist::key("org-a", BlacklistCategory::Ip),
            RedisBlacklist::key("org-b", BlacklistCategory::Ip)
        );
    }
}
