//! Scoring orchestrator
//!
//! Admits the request through the tenant rate limiter, runs every signal
//! lookup concurrently within one lookup deadline, evaluates rules over whatever
//! facts arrived and aggregates them into a score. A lookup that times out or
//! fails is reported as degraded and its fact is treated as absent.

use crate::config::{EngineConfig, Settings};
use crate::metrics::{DEGRADED_LOOKUPS, RISK_ACTIONS, SCORING_DURATION, SCORING_OUTCOMES};
use crate::recorder::{CheckRecord, CheckRecorder, TracingRecorder};
use crate::{
    rules, scoring, DegradeCause, DegradedLookup, Error, LookupSource, Result, ScoringOutcome,
    ScoringReport, ScoringRequest, SignalFact,
};
use chrono::Utc;
use parking_lot::RwLock;
use rate_limiter::{RateLimitResult, RedisBucketStore, TenantRateLimiter};
use redis::aio::ConnectionManager;
use signal_lookups::{
    email_domain, is_hosting_provider, normalize_value, BlacklistCategory, GeoResolver,
    IpActivityCounter, MemoryIpActivity, RedisBlacklist, RedisSignalSets, SignalSet,
    SignalSetLookup, TenantBlacklist,
};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Signal collaborators consulted per request
#[derive(Clone)]
pub struct SignalSources {
    /// Global membership sets
    pub sets: Arc<dyn SignalSetLookup>,
    /// Tenant blacklists
    pub blacklist: Arc<dyn TenantBlacklist>,
    /// Geolocation/ASN resolver
    pub geo: Arc<dyn GeoResolver>,
    /// Per-tenant IP activity
    pub activity: Arc<dyn IpActivityCounter>,
}

/// Entry point for scoring requests
pub struct ScoringService {
    limiter: Arc<TenantRateLimiter>,
    sources: SignalSources,
    recorder: Arc<dyn CheckRecorder>,
    config: RwLock<Arc<EngineConfig>>,
}

impl ScoringService {
    /// Service over explicit collaborators; `config` is validated first
    pub fn new(
        limiter: Arc<TenantRateLimiter>,
        sources: SignalSources,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            limiter,
            sources,
            recorder: Arc::new(TracingRecorder),
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// Replace the check recorder
    pub fn with_recorder(mut self, recorder: Arc<dyn CheckRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Wire Redis-backed limiter, signal sets and blacklists from settings
    pub async fn connect(settings: &Settings, geo: Arc<dyn GeoResolver>) -> Result<Self> {
        let client = redis::Client::open(settings.redis.url.as_str())?;
        let redis = ConnectionManager::new(client).await?;
        info!("Connected to Redis at {}", settings.redis.url);

        let limiter_config = settings.rate_limiter_config();
        let store = RedisBucketStore::new(redis.clone(), limiter_config.idle_eviction);
        let limiter = TenantRateLimiter::new(limiter_config, Arc::new(store))?;

        let engine = settings.engine_config()?;
        let sources = SignalSources {
            sets: Arc::new(RedisSignalSets::new(redis.clone())),
            blacklist: Arc::new(RedisBlacklist::new(redis)),
            geo,
            activity: Arc::new(MemoryIpActivity::new(engine.repeat_ip_window)),
        };

        Self::new(Arc::new(limiter), sources, engine)
    }

    /// Rate limiter in use
    pub fn limiter(&self) -> &Arc<TenantRateLimiter> {
        &self.limiter
    }

    /// Snapshot requests started now will use
    pub fn current_config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config.read())
    }

    /// Swap the engine configuration.
    ///
    /// In-flight requests keep the snapshot they started with.
    pub fn reload_config(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = Arc::new(config);
        info!("Engine configuration reloaded");
        Ok(())
    }

    /// Per-tenant bucket override
    pub fn configure_limits(&self, tenant: &str, capacity: f64, refill_rate: f64) -> Result<()> {
        self.limiter.configure_limits(tenant, capacity, refill_rate)?;
        Ok(())
    }

    /// Drop a per-tenant bucket override
    pub fn clear_limits(&self, tenant: &str) -> bool {
        self.limiter.clear_limits(tenant)
    }

    /// Evict idle rate limit buckets and IP activity sources once
    pub async fn evict_idle(&self) -> Result<usize> {
        evict_idle(&self.limiter, self.sources.activity.as_ref()).await
    }

    /// Periodically evict idle rate limit buckets and IP activity sources
    pub fn start_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(&self.limiter);
        let activity = Arc::clone(&self.sources.activity);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                if let Err(e) = evict_idle(&limiter, activity.as_ref()).await {
                    warn!("Maintenance pass failed: {}", e);
                }
            }
        })
    }

    /// Score one request
    pub async fn score(&self, request: ScoringRequest) -> ScoringOutcome {
        let timer = SCORING_DURATION.start_timer();
        let outcome = self.score_request(request).await;
        timer.observe_duration();

        SCORING_OUTCOMES.with_label_values(&[outcome.label()]).inc();
        outcome
    }

    async fn score_request(&self, request: ScoringRequest) -> ScoringOutcome {
        let config = self.current_config();

        if let Err(e) = validate_request(&request, &config) {
            debug!("Rejected request for tenant {}: {}", request.tenant, e);
            let reason = match e {
                Error::InvalidRequest(reason) => reason,
                other => other.to_string(),
            };
            return ScoringOutcome::InvalidRequest(reason);
        }

        let remaining_quota = match self.limiter.try_acquire_one(&request.tenant).await {
            Ok(RateLimitResult::Allowed { remaining }) => Some(remaining),
            Ok(RateLimitResult::FailedOpen) => None,
            Ok(RateLimitResult::Denied { retry_after, .. }) => {
                return ScoringOutcome::RateLimited { retry_after };
            }
            Err(e) => {
                error!("Rate limiter unavailable for tenant {}: {}", request.tenant, e);
                return ScoringOutcome::LimiterUnavailable;
            }
        };

        let lookups = Lookups {
            tenant: &request.tenant,
            sources: &self.sources,
            config: &config,
            deadline: Instant::now() + config.lookup_timeout,
        };
        let gathered = lookups.run(&request).await;

        let reasons = rules::evaluate(&gathered.facts, &config);
        let result = scoring::aggregate(reasons, config.action_policy_for(&request.tenant));

        for degraded in &gathered.degraded {
            DEGRADED_LOOKUPS
                .with_label_values(&[degraded.source.as_str()])
                .inc();
        }
        RISK_ACTIONS.with_label_values(&[result.action.as_str()]).inc();

        let report = ScoringReport {
            check_id: Uuid::new_v4(),
            tenant: request.tenant.clone(),
            result,
            degraded: gathered.degraded,
            remaining_quota,
            scored_at: Utc::now(),
        };

        info!(
            check_id = %report.check_id,
            tenant = %report.tenant,
            score = report.result.score,
            risk_level = report.result.risk_level.as_str(),
            action = report.result.action.as_str(),
            degraded = report.degraded.len(),
            "Request scored"
        );

        self.spawn_side_effects(&request, &report);
        ScoringOutcome::Scored(report)
    }

    fn spawn_side_effects(&self, request: &ScoringRequest, report: &ScoringReport) {
        if let Some(ip) = request.ip {
            let activity = Arc::clone(&self.sources.activity);
            let tenant = request.tenant.clone();
            tokio::spawn(async move {
                if let Err(e) = activity.record(&tenant, ip).await {
                    warn!("Failed to record IP activity for {}: {}", tenant, e);
                }
            });
        }

        let recorder = Arc::clone(&self.recorder);
        let check = CheckRecord::from_report(report, request.email.clone(), request.ip);
        tokio::spawn(async move {
            let check_id = check.check_id;
            if let Err(e) = recorder.record(check).await {
                warn!("Failed to record check {}: {}", check_id, e);
            }
        });
    }
}

async fn evict_idle(
    limiter: &TenantRateLimiter,
    activity: &dyn IpActivityCounter,
) -> Result<usize> {
    let buckets = limiter.cleanup().await?;
    let sources = activity.evict_idle().await?;
    if sources > 0 {
        info!("Evicted {} idle IP activity sources", sources);
    }
    Ok(buckets + sources)
}

/// Reject malformed requests before any tokens are charged
pub fn validate_request(request: &ScoringRequest, config: &EngineConfig) -> Result<()> {
    if request.tenant.trim().is_empty() {
        return Err(Error::InvalidRequest("tenant is required".to_string()));
    }

    if request.email.is_none() && request.ip.is_none() {
        return Err(Error::InvalidRequest(
            "at least one of email or ip is required".to_string(),
        ));
    }

    if let Some(email) = &request.email {
        if email_domain(email).is_none() {
            return Err(Error::InvalidRequest(format!(
                "email has no domain: {}",
                email
            )));
        }
    }

    if request.metadata.len() > config.max_metadata_entries {
        return Err(Error::InvalidRequest(format!(
            "metadata has {} entries, limit is {}",
            request.metadata.len(),
            config.max_metadata_entries
        )));
    }

    for (key, value) in &request.metadata {
        if key.len() > config.max_metadata_key_len {
            return Err(Error::InvalidRequest(format!(
                "metadata key exceeds {} bytes",
                config.max_metadata_key_len
            )));
        }
        if value.len() > config.max_metadata_value_len {
            return Err(Error::InvalidRequest(format!(
                "metadata value for {} exceeds {} bytes",
                key, config.max_metadata_value_len
            )));
        }
    }

    Ok(())
}

/// Addresses worth geolocating
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// Run one lookup under `timeout`, turning failures into a degraded marker
async fn bounded<T, F>(
    source: LookupSource,
    timeout: Duration,
    lookup: F,
) -> std::result::Result<T, DegradedLookup>
where
    F: Future<Output = signal_lookups::Result<T>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("Lookup {} failed: {}", source.as_str(), e);
            Err(DegradedLookup {
                source,
                cause: DegradeCause::Error(e.to_string()),
            })
        }
        Err(_) => {
            warn!("Lookup {} timed out after {:?}", source.as_str(), timeout);
            Err(DegradedLookup {
                source,
                cause: DegradeCause::Timeout,
            })
        }
    }
}

#[derive(Debug, Default)]
struct Gathered {
    facts: Vec<SignalFact>,
    degraded: Vec<DegradedLookup>,
}

impl Gathered {
    fn push(&mut self, outcome: std::result::Result<Option<SignalFact>, DegradedLookup>) {
        match outcome {
            Ok(Some(fact)) => self.facts.push(fact),
            Ok(None) => {}
            Err(degraded) => self.degraded.push(degraded),
        }
    }

    fn merge(&mut self, other: Gathered) {
        self.facts.extend(other.facts);
        self.degraded.extend(other.degraded);
    }
}

/// Lookups for one request, pinned to one config snapshot.
///
/// All lookups share one deadline, so lookups chained after geolocation
/// only get what is left of the budget.
struct Lookups<'a> {
    tenant: &'a str,
    sources: &'a SignalSources,
    config: &'a EngineConfig,
    deadline: Instant,
}

impl<'a> Lookups<'a> {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    async fn run(&self, request: &ScoringRequest) -> Gathered {
        let domain = request.email.as_deref().and_then(email_domain);
        let ip = request.ip;
        let ip_value = ip.map(|ip| ip.to_string());

        let (disposable, vpn, tor, geo, domain_blacklist, ip_blacklist, activity) = tokio::join!(
            self.membership(
                LookupSource::DisposableEmail,
                SignalSet::DisposableEmailDomains,
                domain.as_deref(),
                SignalFact::DisposableEmail,
            ),
            self.membership(
                LookupSource::VpnIp,
                SignalSet::VpnIps,
                ip_value.as_deref(),
                SignalFact::KnownVpnOrProxy,
            ),
            self.membership(
                LookupSource::TorExit,
                SignalSet::TorExitNodes,
                ip_value.as_deref(),
                SignalFact::TorExitNode,
            ),
            self.geolocation(ip),
            self.blacklisted(
                LookupSource::BlacklistEmailDomain,
                BlacklistCategory::EmailDomain,
                domain.clone(),
            ),
            self.blacklisted(LookupSource::BlacklistIp, BlacklistCategory::Ip, ip_value.clone()),
            self.repeat_count(ip),
        );

        let mut gathered = Gathered::default();
        for part in [disposable, vpn, tor, geo, domain_blacklist, ip_blacklist, activity] {
            gathered.merge(part);
        }
        gathered
    }

    async fn membership(
        &self,
        source: LookupSource,
        set: SignalSet,
        member: Option<&str>,
        fact: fn(bool) -> SignalFact,
    ) -> Gathered {
        let mut out = Gathered::default();
        if let Some(member) = member {
            let outcome = bounded(
                source,
                self.remaining(),
                self.sources.sets.contains(set, member),
            )
            .await;
            out.push(outcome.map(|hit| Some(fact(hit))));
        }
        out
    }

    async fn blacklisted(
        &self,
        source: LookupSource,
        category: BlacklistCategory,
        value: Option<String>,
    ) -> Gathered {
        let mut out = Gathered::default();
        let value = match value {
            Some(value) if self.config.enable_custom_blacklists => normalize_value(&value),
            _ => return out,
        };

        let outcome = bounded(
            source,
            self.remaining(),
            self.sources
                .blacklist
                .is_blacklisted(self.tenant, category, &value),
        )
        .await;
        out.push(outcome.map(|hit| hit.then(|| SignalFact::OrgBlacklisted { category, value })));
        out
    }

    async fn geolocation(&self, ip: Option<IpAddr>) -> Gathered {
        let mut out = Gathered::default();
        let ip = match ip {
            Some(ip) if is_public(ip) => ip,
            _ => return out,
        };

        let resolved = bounded(
            LookupSource::Geolocation,
            self.remaining(),
            self.sources.geo.resolve(ip),
        )
        .await;
        let info = match resolved {
            Ok(Some(info)) => info,
            Ok(None) => {
                out.degraded.push(DegradedLookup {
                    source: LookupSource::Geolocation,
                    cause: DegradeCause::Unavailable,
                });
                return out;
            }
            Err(degraded) => {
                out.degraded.push(degraded);
                return out;
            }
        };

        out.facts.push(SignalFact::HostingProvider(is_hosting_provider(&info)));

        let (country, isp, asn) = tokio::join!(
            self.membership(
                LookupSource::HighRiskCountry,
                SignalSet::HighRiskCountries,
                info.country_code.as_deref(),
                SignalFact::HighRiskCountry,
            ),
            self.blacklisted(
                LookupSource::BlacklistIsp,
                BlacklistCategory::Isp,
                info.asn_org.clone(),
            ),
            self.blacklisted(
                LookupSource::BlacklistAsn,
                BlacklistCategory::Asn,
                info.asn.map(|asn| asn.to_string()),
            ),
        );
        out.merge(country);
        out.merge(isp);
        out.merge(asn);
        out
    }

    async fn repeat_count(&self, ip: Option<IpAddr>) -> Gathered {
        let mut out = Gathered::default();
        if let Some(ip) = ip {
            let outcome = bounded(
                LookupSource::IpActivity,
                self.remaining(),
                self.sources
                    .activity
                    .count_recent(self.tenant, ip, self.config.repeat_ip_window),
            )
            .await;
            out.push(outcome.map(|count| Some(SignalFact::RepeatFromIp(count))));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request() -> ScoringRequest {
        ScoringRequest::new("acme").with_email("user@example.com")
    }

    #[test]
    fn test_validate_accepts_minimal_request() {
        let config = EngineConfig::default();
        assert!(validate_request(&request(), &config).is_ok());
        assert!(validate_request(
            &ScoringRequest::new("acme").with_ip("203.0.113.7".parse().unwrap()),
            &config
        )
        .is_ok());
    }

    #[test]
    fn test_validate_requires_email_or_ip() {
        let config = EngineConfig::default();
        let result = validate_request(&ScoringRequest::new("acme"), &config);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_requires_tenant() {
        let config = EngineConfig::default();
        let result = validate_request(&ScoringRequest::new("  ").with_email("a@b.com"), &config);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_email_domain() {
        let config = EngineConfig::default();
        for email in ["no-at-sign", "user@", "user@   "] {
            let result = validate_request(&ScoringRequest::new("acme").with_email(email), &config);
            assert!(result.is_err(), "{}", email);
        }
    }

    #[test]
    fn test_validate_metadata_caps() {
        let config = EngineConfig::default();

        let mut metadata = HashMap::new();
        for i in 0..=config.max_metadata_entries {
            metadata.insert(format!("k{}", i), "v".to_string());
        }
        let too_many = ScoringRequest {
            metadata,
            ..request()
        };
        assert!(validate_request(&too_many, &config).is_err());

        let long_key = request().with_metadata("k".repeat(129), "v");
        assert!(validate_request(&long_key, &config).is_err());

        let long_value = request().with_metadata("k", "v".repeat(1025));
        assert!(validate_request(&long_value, &config).is_err());

        let at_limits = request().with_metadata("k".repeat(128), "v".repeat(1024));
        assert!(validate_request(&at_limits, &config).is_ok());
    }

    #[test]
    fn test_is_public() {
        assert!(is_public("185.220.101.5".parse().unwrap()));
        assert!(is_public("2001:4860:4860::8888".parse().unwrap()));
        assert!(!is_public("10.1.2.3".parse().unwrap()));
        assert!(!is_public("192.168.0.1".parse().unwrap()));
        assert!(!is_public("127.0.0.1".parse().unwrap()));
        assert!(!is_public("::1".parse().unwrap()));
        assert!(!is_public("fd00::1".parse().unwrap()));
        assert!(!is_public("fe80::1".parse().unwrap()));
        assert!(!is_public("::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_public("::ffff:127.0.0.1".parse().unwrap()));
        assert!(is_public("::ffff:185.220.101.5".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<bool, signal_lookups::LookupError>(true)
        };
        let outcome = bounded(LookupSource::Geolocation, Duration::from_millis(10), slow).await;
        assert_eq!(
            outcome,
            Err(DegradedLookup {
                source: LookupSource::Geolocation,
                cause: DegradeCause::Timeout,
            })
        );
    }

    #[tokio::test]
    async fn test_bounded_reports_error() {
        let failing = async {
            Err::<bool, _>(signal_lookups::LookupError::Unavailable("down".to_string()))
        };
        let outcome = bounded(LookupSource::VpnIp, Duration::from_millis(50), failing).await;
        assert!(matches!(
            outcome,
            Err(DegradedLookup {
                source: LookupSource::VpnIp,
                cause: DegradeCause::Error(_),
            })
        ));
    }
}
