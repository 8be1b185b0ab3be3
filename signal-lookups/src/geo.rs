//! Geolocation and hosting-provider classification

use crate::error::Result;
use crate::types::GeoInfo;
use async_trait::async_trait;
use dashmap::DashMap;
use std::net::IpAddr;

/// ASN organisation substrings that mark hosting/cloud networks.
const HOSTING_KEYWORDS: &[&str] = &[
    "hosting",
    "cloud",
    "server",
    "datacenter",
    "data center",
    "vps",
    "dedicated",
    "colocation",
    "colo",
    "aws",
    "amazon",
    "google",
    "microsoft",
    "digitalocean",
    "vultr",
    "linode",
    "hetzner",
    "ovh",
    "scaleway",
    "contabo",
];

/// Well-known datacenter ASNs.
const DATACENTER_ASNS: &[u32] = &[
    13335, // Cloudflare
    15169, // Google
    16509, // Amazon
    8075,  // Microsoft
    14061, // DigitalOcean
    20473, // Choopa/Vultr
    63949, // Linode
    24940, // Hetzner
    16276, // OVH
];

/// Read-only geolocation/ASN resolver.
///
/// `Ok(None)` means the resolver has no data for the address, which callers
/// treat the same as an unavailable lookup.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Geolocation and network owner for `ip`
    async fn resolve(&self, ip: IpAddr) -> Result<Option<GeoInfo>>;
}

/// Resolver backed by a fixed table.
#[derive(Default)]
pub struct StaticGeoResolver {
    table: DashMap<IpAddr, GeoInfo>,
}

impl StaticGeoResolver {
    /// Resolver with no entries
    pub fn new() -> Self {
        Self::default()
    }

    /// Register data for one address
    pub fn insert(&self, ip: IpAddr, info: GeoInfo) {
        self.table.insert(ip, info);
    }
}

#[async_trait]
impl GeoResolver for StaticGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<Option<GeoInfo>> {
        Ok(self.table.get(&ip).map(|info| info.value().clone()))
    }
}

/// Whether the network owning the address is a hosting provider or datacenter.
pub fn is_hosting_provider(info: &GeoInfo) -> bool {
    if let Some(asn) = info.asn {
        if DATACENTER_ASNS.contains(&asn) {
            return true;
        }
    }

    match &info.asn_org {
        Some(org) => {
            let org = org.to_lowercase();
            HOSTING_KEYWORDS.iter().any(|keyword| org.contains(keyword))
        }
        None => false,
    }
}
