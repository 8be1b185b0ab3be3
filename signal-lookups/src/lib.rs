//! Signal lookups for fraud scoring
//!
//! Read-only collaborators consulted per scoring request:
//! - Global membership sets (disposable email domains, VPN/proxy IPs, Tor exits, high-risk countries)
//! - Per-tenant blacklists by email domain, IP, ISP and ASN
//! - Geolocation/ASN resolution and hosting-provider classification
//! - Per-tenant IP activity counting over a sliding window
//!
//! Each collaborator is an async trait with an in-memory backend, and a Redis
//! backend where the data is shared between processes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity;
pub mod blacklist;
pub mod error;
pub mod geo;
pub mod redis_backend;
pub mod sets;
pub mod types;

pub use activity::{IpActivityCounter, MemoryIpActivity};
pub use blacklist::{MemoryBlacklist, TenantBlacklist};
pub use error::{LookupError, Result};
pub use geo::{is_hosting_provider, GeoResolver, StaticGeoResolver};
pub use redis_backend::{RedisBlacklist, RedisSignalSets};
pub use sets::{MemorySignalSets, SignalSetLookup};
pub use types::{email_domain, normalize_value, BlacklistCategory, GeoInfo, SignalSet};
