//! Check history
//!
//! Every scored request is handed to a [`CheckRecorder`] after the result is
//! returned. Recording never blocks or fails the scoring call.

use crate::{Action, ReasonCode, Result, RiskLevel, ScoringReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::info;
use uuid::Uuid;

/// Persisted form of one scored check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Check identifier
    pub check_id: Uuid,
    /// Tenant the check was made for
    pub tenant: String,
    /// Email as submitted
    pub email: Option<String>,
    /// Client IP as submitted
    pub ip: Option<IpAddr>,
    /// Clamped score
    pub score: u8,
    /// Risk level
    pub risk_level: RiskLevel,
    /// Recommended action
    pub action: Action,
    /// Triggered reason codes in canonical order
    pub reasons: Vec<ReasonCode>,
    /// Whether any lookup degraded
    pub degraded: bool,
    /// Scoring timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckRecord {
    /// Build from a scored report and the request identity
    pub fn from_report(report: &ScoringReport, email: Option<String>, ip: Option<IpAddr>) -> Self {
        Self {
            check_id: report.check_id,
            tenant: report.tenant.clone(),
            email,
            ip,
            score: report.result.score,
            risk_level: report.result.risk_level,
            action: report.result.action,
            reasons: report.result.reason_codes(),
            degraded: report.is_degraded(),
            created_at: report.scored_at,
        }
    }
}

/// Sink for scored checks
#[async_trait]
pub trait CheckRecorder: Send + Sync {
    /// Persist one check
    async fn record(&self, check: CheckRecord) -> Result<()>;
}

/// Emits each check as a structured log line
#[derive(Debug, Default)]
pub struct TracingRecorder;

#[async_trait]
impl CheckRecorder for TracingRecorder {
    async fn record(&self, check: CheckRecord) -> Result<()> {
        let payload = serde_json::to_string(&check)
            .map_err(|e| crate::Error::Recorder(e.to_string()))?;
        info!(
            check_id = %check.check_id,
            tenant = %check.tenant,
            score = check.score,
            action = check.action.as_str(),
            check = %payload,
            "Fraud check recorded"
        );
        Ok(())
    }
}

/// Per-tenant summary of recorded checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckStats {
    /// Checks recorded
    pub total: usize,
    /// Checks at [`RiskLevel::None`]
    pub none: usize,
    /// Checks at [`RiskLevel::Low`]
    pub low: usize,
    /// Checks at [`RiskLevel::Medium`]
    pub medium: usize,
    /// Checks at [`RiskLevel::High`]
    pub high: usize,
    /// Checks where a lookup degraded
    pub degraded: usize,
    /// Mean score, 0.0 when nothing was recorded
    pub average_score: f64,
}

/// Keeps checks in memory, newest last
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    checks: Mutex<Vec<CheckRecord>>,
}

impl MemoryRecorder {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded checks
    pub fn checks(&self) -> Vec<CheckRecord> {
        self.checks.lock().clone()
    }

    /// Checks recorded for `tenant`
    pub fn checks_for(&self, tenant: &str) -> Vec<CheckRecord> {
        self.checks
            .lock()
            .iter()
            .filter(|c| c.tenant == tenant)
            .cloned()
            .collect()
    }

    /// Counts by risk level for `tenant`
    pub fn stats_for(&self, tenant: &str) -> CheckStats {
        let checks = self.checks.lock();
        let mut stats = CheckStats::default();
        let mut score_sum = 0u64;

        for check in checks.iter().filter(|c| c.tenant == tenant) {
            stats.total += 1;
            score_sum += u64::from(check.score);
            if check.degraded {
                stats.degraded += 1;
            }
            match check.risk_level {
                RiskLevel::None => stats.none += 1,
                RiskLevel::Low => stats.low += 1,
                RiskLevel::Medium => stats.medium += 1,
                RiskLevel::High => stats.high += 1,
            }
        }

        if stats.total > 0 {
            stats.average_score = score_sum as f64 / stats.total as f64;
        }
        stats
    }
}

#[async_trait]
impl CheckRecorder for MemoryRecorder {
    async fn record(&self, check: CheckRecord) -> Result<()> {
        self.checks.lock().push(check);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tenant: &str) -> CheckRecord {
        CheckRecord {
            check_id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            email: Some("user@example.com".to_string()),
            ip: None,
            score: 0,
            risk_level: RiskLevel::None,
            action: Action::Allow,
            reasons: vec![],
            degraded: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_recorder_filters_by_tenant() {
        let recorder = MemoryRecorder::new();
        recorder.record(record("acme")).await.unwrap();
        recorder.record(record("globex")).await.unwrap();
        recorder.record(record("acme")).await.unwrap();

        assert_eq!(recorder.checks().len(), 3);
        assert_eq!(recorder.checks_for("acme").len(), 2);
    }

    #[tokio::test]
    async fn test_stats_count_levels_per_tenant() {
        let recorder = MemoryRecorder::new();
        for (tenant, score, level, degraded) in [
            ("acme", 0, RiskLevel::None, false),
            ("acme", 40, RiskLevel::Low, true),
            ("acme", 80, RiskLevel::High, false),
            ("acme", 100, RiskLevel::High, false),
            ("globex", 70, RiskLevel::Medium, false),
        ] {
            let mut check = record(tenant);
            check.score = score;
            check.risk_level = level;
            check.degraded = degraded;
            recorder.record(check).await.unwrap();
        }

        let stats = recorder.stats_for("acme");
        assert_eq!(stats.total, 4);
        assert_eq!(stats.none, 1);
        assert_eq!(stats.low, 1);
        assert_eq!(stats.medium, 0);
        assert_eq!(stats.high, 2);
        assert_eq!(stats.degraded, 1);
        assert!((stats.average_score - 55.0).abs() < 1e-9);

        assert_eq!(recorder.stats_for("initech"), CheckStats::default());
    }

    #[tokio::test]
    async fn test_tracing_recorder_accepts_check() {
        assert!(TracingRecorder.record(record("acme")).await.is_ok());
    }
}
