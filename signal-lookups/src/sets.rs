//! Global membership sets (disposable domains, VPN, Tor, countries)

use crate::error::Result;
use crate::types::SignalSet;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::info;

/// Membership test against a global signal set
#[async_trait]
pub trait SignalSetLookup: Send + Sync {
    /// Whether `member` (normalized for `set`) is in `set`
    async fn contains(&self, set: SignalSet, member: &str) -> Result<bool>;
}

/// In-process membership sets, replaced wholesale by loaders.
#[derive(Default)]
pub struct MemorySignalSets {
    // Map: set -> normalized members
    sets: Arc<DashMap<SignalSet, DashSet<String>>>,
}

impl MemorySignalSets {
    /// Empty sets
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a set into memory, replacing any previous contents.
    pub fn load_set<I, S>(&self, set: SignalSet, members: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let loaded = DashSet::new();
        for member in members {
            loaded.insert(set.normalize(member.as_ref()));
        }
        let count = loaded.len();
        self.sets.insert(set, loaded);
        info!("Loaded {} set with {} members", set, count);
    }

    /// Add one member
    pub fn insert(&self, set: SignalSet, member: &str) {
        self.sets
            .entry(set)
            .or_insert_with(DashSet::new)
            .insert(set.normalize(member));
    }

    /// Number of members in `set`
    pub fn len(&self, set: SignalSet) -> usize {
        self.sets.get(&set).map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SignalSetLookup for MemorySignalSets {
    async fn contains(&self, set: SignalSet, member: &str) -> Result<bool> {
        let normalized = set.normalize(member);
        Ok(self
            .sets
            .get(&set)
            .map(|members| members.contains(&normalized))
            .unwrap_or(false))
    }
}
