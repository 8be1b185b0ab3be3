//! Shared lookup types and value normalisation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Global membership sets maintained by ingestion jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSet {
    /// Throwaway email providers
    DisposableEmailDomains,
    /// Known VPN and proxy egress addresses
    VpnIps,
    /// Tor exit relays
    TorExitNodes,
    /// ISO country codes treated as high risk
    HighRiskCountries,
}

impl SignalSet {
    /// Key of the backing set in the shared store.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSet::DisposableEmailDomains => "disposable_email_domains",
            SignalSet::VpnIps => "vpn_ips",
            SignalSet::TorExitNodes => "tor_exit_nodes",
            SignalSet::HighRiskCountries => "high_risk_countries",
        }
    }

    /// Country codes are stored upper-case, everything else lower-case.
    pub fn normalize(&self, member: &str) -> String {
        match self {
            SignalSet::HighRiskCountries => member.trim().to_uppercase(),
            _ => normalize_value(member),
        }
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of value a tenant blacklist entry matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistCategory {
    /// Email domain
    EmailDomain,
    /// Client IP address
    Ip,
    /// ASN organisation name
    Isp,
    /// Autonomous system number
    Asn,
}

impl BlacklistCategory {
    /// Key segment used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistCategory::EmailDomain => "email_domain",
            BlacklistCategory::Ip => "ip",
            BlacklistCategory::Isp => "isp",
            BlacklistCategory::Asn => "asn",
        }
    }
}

impl fmt::Display for BlacklistCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geolocation and network ownership for one IP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 code
    pub country_code: Option<String>,
    /// Autonomous system number
    pub asn: Option<u32>,
    /// Organisation owning the ASN
    pub asn_org: Option<String>,
}

/// Blacklist and set members are compared trimmed and lower-cased.
pub fn normalize_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Domain part of an email address (after the last `@`), normalized.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = normalize_value(domain);
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("User@Mailinator.COM"), Some("mailinator.com".to_string()));
        assert_eq!(email_domain("a@b@example.org"), Some("example.org".to_string()));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn test_set_normalization() {
        assert_eq!(SignalSet::HighRiskCountries.normalize(" kp "), "KP");
        assert_eq!(SignalSet::DisposableEmailDomains.normalize(" Temp-Mail.ORG"), "temp-mail.org");
    }
}
