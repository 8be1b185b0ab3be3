//! Core types for the risk engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_lookups::BlacklistCategory;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use uuid::Uuid;

/// Identity signal to score on behalf of a tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringRequest {
    /// Tenant resolved by upstream authentication
    pub tenant: String,

    /// Email address, if supplied
    pub email: Option<String>,

    /// Client IP address, if supplied
    pub ip: Option<IpAddr>,

    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScoringRequest {
    /// Request for `tenant` with no signals attached
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            ..Self::default()
        }
    }

    /// Attach an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach an IP address
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Fixed identifiers for fraud signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Email domain is a disposable provider
    DisposableEmail,
    /// IP is a known VPN or proxy
    VpnIp,
    /// IP is a Tor exit node
    TorExit,
    /// IP belongs to a hosting provider
    BadIsp,
    /// IP geolocates to a high-risk country
    HighRiskCountry,
    /// Too many recent requests from the same IP
    MultipleFromIp,
    /// Matched one of the tenant's own blacklist entries
    CustomBlacklist,
}

impl ReasonCode {
    /// All reason codes
    pub const ALL: [ReasonCode; 7] = [
        ReasonCode::DisposableEmail,
        ReasonCode::VpnIp,
        ReasonCode::TorExit,
        ReasonCode::BadIsp,
        ReasonCode::HighRiskCountry,
        ReasonCode::MultipleFromIp,
        ReasonCode::CustomBlacklist,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::DisposableEmail => "disposable_email",
            ReasonCode::VpnIp => "vpn_ip",
            ReasonCode::TorExit => "tor_exit",
            ReasonCode::BadIsp => "bad_isp",
            ReasonCode::HighRiskCountry => "high_risk_country",
            ReasonCode::MultipleFromIp => "multiple_from_ip",
            ReasonCode::CustomBlacklist => "custom_blacklist",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fact produced by one signal lookup for one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalFact {
    /// Email domain membership in the disposable set
    DisposableEmail(bool),
    /// IP membership in the VPN/proxy set
    KnownVpnOrProxy(bool),
    /// IP membership in the Tor exit set
    TorExitNode(bool),
    /// Network owner classified as hosting/datacenter
    HostingProvider(bool),
    /// Country membership in the high-risk set
    HighRiskCountry(bool),
    /// Requesting tenant's blacklist matched
    OrgBlacklisted {
        /// Entry category
        category: BlacklistCategory,
        /// Normalized matched value
        value: String,
    },
    /// Recent requests from the same IP for this tenant
    RepeatFromIp(u64),
}

/// One triggered rule and the points it contributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredReason {
    /// Reason code
    pub code: ReasonCode,

    /// Points from the weight table
    pub points: u8,

    /// Distinguishes multiple matches of the same code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Discrete risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Score in [0, 30)
    None,
    /// Score in [30, 60)
    Low,
    /// Score in [60, 80)
    Medium,
    /// Score in [80, 100]
    High,
}

impl RiskLevel {
    /// Map a clamped score to its level
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => RiskLevel::None,
            30..=59 => RiskLevel::Low,
            60..=79 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Recommended action for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Safe to proceed
    Allow,
    /// Proceed, monitor closely
    Monitor,
    /// Step-up verification (CAPTCHA, 2FA)
    Challenge,
    /// Block or manually review
    Block,
}

impl Action {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Monitor => "monitor",
            Action::Challenge => "challenge",
            Action::Block => "block",
        }
    }

    /// Human-readable guidance
    pub fn message(&self) -> &'static str {
        match self {
            Action::Allow => "Low fraud risk - safe to proceed",
            Action::Monitor => "Some risk indicators present - proceed and monitor closely",
            Action::Challenge => "Elevated fraud risk - challenge the user with additional verification",
            Action::Block => "High fraud risk - block or manually review this request",
        }
    }
}

/// Final score for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Triggered reasons in canonical order
    pub reasons: Vec<TriggeredReason>,

    /// Sum of points clamped to 100
    pub score: u8,

    /// Risk level
    pub risk_level: RiskLevel,

    /// Recommended action
    pub action: Action,

    /// Guidance for the recommended action
    pub message: String,
}

impl ScoreResult {
    /// Reason codes in order
    pub fn reason_codes(&self) -> Vec<ReasonCode> {
        self.reasons.iter().map(|r| r.code).collect()
    }

    /// Whether `code` triggered
    pub fn has_reason(&self, code: ReasonCode) -> bool {
        self.reasons.iter().any(|r| r.code == code)
    }
}

/// Signal sources consulted per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    /// Disposable email domain set
    DisposableEmail,
    /// VPN/proxy IP set
    VpnIp,
    /// Tor exit node set
    TorExit,
    /// Geolocation/ASN resolver
    Geolocation,
    /// High-risk country set
    HighRiskCountry,
    /// Tenant blacklist, email domain entries
    BlacklistEmailDomain,
    /// Tenant blacklist, IP entries
    BlacklistIp,
    /// Tenant blacklist, ISP entries
    BlacklistIsp,
    /// Tenant blacklist, ASN entries
    BlacklistAsn,
    /// Per-tenant IP activity counter
    IpActivity,
}

impl LookupSource {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupSource::DisposableEmail => "disposable_email",
            LookupSource::VpnIp => "vpn_ip",
            LookupSource::TorExit => "tor_exit",
            LookupSource::Geolocation => "geolocation",
            LookupSource::HighRiskCountry => "high_risk_country",
            LookupSource::BlacklistEmailDomain => "blacklist_email_domain",
            LookupSource::BlacklistIp => "blacklist_ip",
            LookupSource::BlacklistIsp => "blacklist_isp",
            LookupSource::BlacklistAsn => "blacklist_asn",
            LookupSource::IpActivity => "ip_activity",
        }
    }
}

/// Why a lookup produced no fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeCause {
    /// Did not answer within its timeout
    Timeout,
    /// Answered with an error
    Error(String),
    /// Answered that it has no data
    Unavailable,
}

/// A lookup whose fact is missing from the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedLookup {
    /// Source that degraded
    pub source: LookupSource,
    /// What happened
    pub cause: DegradeCause,
}

/// Scored result plus request metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Check identifier
    pub check_id: Uuid,

    /// Tenant the check was made for
    pub tenant: String,

    /// Score
    pub result: ScoreResult,

    /// Lookups that did not contribute a fact
    pub degraded: Vec<DegradedLookup>,

    /// Tokens left for the tenant, `None` when the limiter failed open
    pub remaining_quota: Option<f64>,

    /// Scoring timestamp
    pub scored_at: DateTime<Utc>,
}

impl ScoringReport {
    /// Whether any lookup degraded
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Whether `source` degraded
    pub fn degraded_source(&self, source: LookupSource) -> bool {
        self.degraded.iter().any(|d| d.source == source)
    }
}

/// Exactly one of these is returned per scoring call
#[derive(Debug, Clone)]
pub enum ScoringOutcome {
    /// Request was scored
    Scored(ScoringReport),

    /// Tenant is over quota
    RateLimited {
        /// Wait before retrying
        retry_after: Duration,
    },

    /// Request rejected before scoring
    InvalidRequest(String),

    /// Rate limiter store unreachable (fail-closed)
    LimiterUnavailable,
}

impl ScoringOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            ScoringOutcome::Scored(_) => "scored",
            ScoringOutcome::RateLimited { .. } => "rate_limited",
            ScoringOutcome::InvalidRequest(_) => "invalid_request",
            ScoringOutcome::LimiterUnavailable => "limiter_unavailable",
        }
    }

    /// The report, if scored
    pub fn report(&self) -> Option<&ScoringReport> {
        match self {
            ScoringOutcome::Scored(report) => Some(report),
            _ => None,
        }
    }
}
