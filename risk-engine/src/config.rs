//! Engine configuration
//!
//! [`Settings`] is loaded once from defaults, `.env` and `RISK_ENGINE__*`
//! environment variables. It is turned into an immutable [`EngineConfig`]
//! snapshot that requests read through an `Arc`; a reload builds a new
//! snapshot and swaps it whole.

use crate::scoring::ActionPolicy;
use crate::{Error, ReasonCode, Result};
use config::Environment;
use rate_limiter::{FailurePolicy, RateLimiterConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Points per reason code, each in [0, 100]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleWeights {
    /// Email domain is disposable
    pub disposable_email: u8,
    /// IP is a known VPN or proxy
    pub vpn_ip: u8,
    /// IP is a Tor exit node
    pub tor_exit: u8,
    /// IP belongs to a hosting provider
    pub bad_isp: u8,
    /// IP geolocates to a high-risk country
    pub high_risk_country: u8,
    /// Too many recent requests from the IP
    pub multiple_from_ip: u8,
    /// Per matched tenant blacklist entry
    pub custom_blacklist: u8,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            disposable_email: 70,
            vpn_ip: 60,
            tor_exit: 80,
            bad_isp: 40,
            high_risk_country: 50,
            multiple_from_ip: 30,
            custom_blacklist: 100,
        }
    }
}

impl RuleWeights {
    /// Points for `code`
    pub fn points(&self, code: ReasonCode) -> u8 {
        match code {
            ReasonCode::DisposableEmail => self.disposable_email,
            ReasonCode::VpnIp => self.vpn_ip,
            ReasonCode::TorExit => self.tor_exit,
            ReasonCode::BadIsp => self.bad_isp,
            ReasonCode::HighRiskCountry => self.high_risk_country,
            ReasonCode::MultipleFromIp => self.multiple_from_ip,
            ReasonCode::CustomBlacklist => self.custom_blacklist,
        }
    }

    /// Reject weights above 100
    pub fn validate(&self) -> Result<()> {
        for code in ReasonCode::ALL {
            let points = self.points(code);
            if points > 100 {
                return Err(Error::InvalidConfig(format!(
                    "weight for {} must be within [0, 100], got {}",
                    code, points
                )));
            }
        }
        Ok(())
    }
}

/// Immutable scoring configuration snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Weight table
    pub weights: RuleWeights,

    /// `multiple_from_ip` triggers when the count exceeds this
    pub repeat_ip_threshold: u64,

    /// Rolling window for the repeat count
    pub repeat_ip_window: Duration,

    /// Budget shared by all lookups of one request
    pub lookup_timeout: Duration,

    /// Most metadata entries per request
    pub max_metadata_entries: usize,
    /// Longest metadata key, in bytes
    pub max_metadata_key_len: usize,
    /// Longest metadata value, in bytes
    pub max_metadata_value_len: usize,

    /// Consult tenant blacklists
    pub enable_custom_blacklists: bool,

    /// Level to action table
    pub action_policy: ActionPolicy,

    /// Whole-table replacements for specific tenants
    pub tenant_action_policies: HashMap<String, ActionPolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: RuleWeights::default(),
            repeat_ip_threshold: 5,
            repeat_ip_window: Duration::from_secs(3600),
            lookup_timeout: Duration::from_millis(200),
            max_metadata_entries: 32,
            max_metadata_key_len: 128,
            max_metadata_value_len: 1024,
            enable_custom_blacklists: true,
            action_policy: ActionPolicy::default(),
            tenant_action_policies: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Check invariants before the snapshot is published
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if self.lookup_timeout.is_zero() {
            return Err(Error::InvalidConfig("lookup timeout must be positive".to_string()));
        }
        if self.repeat_ip_window.is_zero() {
            return Err(Error::InvalidConfig("repeat IP window must be positive".to_string()));
        }
        Ok(())
    }

    /// Action table for `tenant`
    pub fn action_policy_for(&self, tenant: &str) -> &ActionPolicy {
        self.tenant_action_policies
            .get(tenant)
            .unwrap_or(&self.action_policy)
    }
}

/// Process settings as loaded from the environment
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Tenant rate limiting
    pub rate_limit: RateLimitSettings,
    /// Rules and lookups
    pub scoring: ScoringSettings,
    /// Shared store connection
    pub redis: RedisSettings,
    /// Logging
    pub telemetry: TelemetrySettings,
}

/// `rate_limit` section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitSettings {
    /// Default bucket capacity
    pub capacity: f64,
    /// Default refill rate, tokens per second
    pub refill_rate: f64,
    /// Behaviour when the bucket store is unreachable
    pub failure_policy: FailurePolicy,
    /// Idle buckets are dropped after this long
    pub idle_eviction_seconds: u64,
    /// Period of the maintenance task
    pub cleanup_interval_seconds: u64,
}

/// `scoring` section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScoringSettings {
    /// Points per reason code
    pub weights: RuleWeights,
    /// Repeat count that must be exceeded
    pub repeat_ip_threshold: u64,
    /// Rolling window for the repeat count
    pub repeat_ip_window_seconds: u64,
    /// Budget for signal lookups
    pub lookup_timeout_ms: u64,
    /// Most metadata entries per request
    pub max_metadata_entries: usize,
    /// Consult tenant blacklists
    pub enable_custom_blacklists: bool,
}

/// `redis` section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisSettings {
    /// Connection URL
    pub url: String,
}

/// `telemetry` section
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelemetrySettings {
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Settings {
    /// Load settings from defaults, `.env` and the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let weights = RuleWeights::default();
        let builder = config::Config::builder()
            // Rate limit defaults
            .set_default("rate_limit.capacity", 60.0)?
            .set_default("rate_limit.refill_rate", 1.0)?
            .set_default("rate_limit.failure_policy", "closed")?
            .set_default("rate_limit.idle_eviction_seconds", 3600)?
            .set_default("rate_limit.cleanup_interval_seconds", 300)?
            // Rule weights
            .set_default("scoring.weights.disposable_email", weights.disposable_email as i64)?
            .set_default("scoring.weights.vpn_ip", weights.vpn_ip as i64)?
            .set_default("scoring.weights.tor_exit", weights.tor_exit as i64)?
            .set_default("scoring.weights.bad_isp", weights.bad_isp as i64)?
            .set_default("scoring.weights.high_risk_country", weights.high_risk_country as i64)?
            .set_default("scoring.weights.multiple_from_ip", weights.multiple_from_ip as i64)?
            .set_default("scoring.weights.custom_blacklist", weights.custom_blacklist as i64)?
            // Scoring defaults
            .set_default("scoring.repeat_ip_threshold", 5)?
            .set_default("scoring.repeat_ip_window_seconds", 3600)?
            .set_default("scoring.lookup_timeout_ms", 200)?
            .set_default("scoring.max_metadata_entries", 32)?
            .set_default("scoring.enable_custom_blacklists", true)?
            // Redis defaults
            .set_default("redis.url", "redis://localhost:6379")?
            // Telemetry defaults
            .set_default("telemetry.log_level", "info")?
            .set_default("telemetry.json", false)?
            .add_source(
                Environment::with_prefix("RISK_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.engine_config()?;
        Ok(settings)
    }

    /// Build the scoring snapshot
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            weights: self.scoring.weights.clone(),
            repeat_ip_threshold: self.scoring.repeat_ip_threshold,
            repeat_ip_window: Duration::from_secs(self.scoring.repeat_ip_window_seconds),
            lookup_timeout: Duration::from_millis(self.scoring.lookup_timeout_ms),
            max_metadata_entries: self.scoring.max_metadata_entries,
            enable_custom_blacklists: self.scoring.enable_custom_blacklists,
            ..EngineConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the rate limiter configuration
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            default_capacity: self.rate_limit.capacity,
            default_refill_rate: self.rate_limit.refill_rate,
            failure_policy: self.rate_limit.failure_policy,
            idle_eviction: Duration::from_secs(self.rate_limit.idle_eviction_seconds),
        }
    }
}
