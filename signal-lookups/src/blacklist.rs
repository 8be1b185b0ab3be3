//! Per-tenant blacklists

use crate::error::Result;
use crate::types::{normalize_value, BlacklistCategory};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::debug;

/// Per-tenant blacklist. Entries of one tenant are never visible to another.
#[async_trait]
pub trait TenantBlacklist: Send + Sync {
    /// Whether `value` is on `tenant`'s list for `category`
    async fn is_blacklisted(
        &self,
        tenant: &str,
        category: BlacklistCategory,
        value: &str,
    ) -> Result<bool>;
}

/// In-process tenant blacklists
#[derive(Default)]
pub struct MemoryBlacklist {
    // Map: (tenant, category) -> normalized values
    entries: Arc<DashMap<(String, BlacklistCategory), DashSet<String>>>,
}

impl MemoryBlacklist {
    /// Empty blacklist
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, normalized
    pub fn add(&self, tenant: &str, category: BlacklistCategory, value: &str) {
        let normalized = normalize_value(value);
        debug!("Blacklisting {} {} for tenant {}", category, normalized, tenant);
        self.entries
            .entry((tenant.to_string(), category))
            .or_insert_with(DashSet::new)
            .insert(normalized);
    }

    /// Remove an entry, returning whether it existed
    pub fn remove(&self, tenant: &str, category: BlacklistCategory, value: &str) -> bool {
        self.entries
            .get(&(tenant.to_string(), category))
            .map(|values| values.remove(&normalize_value(value)).is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl TenantBlacklist for MemoryBlacklist {
    async fn is_blacklisted(
        &self,
        tenant: &str,
        category: BlacklistCategory,
        value: &str,
    ) -> Result<bool> {
        let normalized = normalize_value(value);
        Ok(self
            .entries
            .get(&(tenant.to_string(), category))
            .map(|values| values.contains(&normalized))
            .unwrap_or(false))
    }
}
