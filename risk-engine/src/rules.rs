//! Rule evaluation
//!
//! Each rule is a predicate over the gathered facts. Rules are independent:
//! a fact that is absent simply does not trigger its rule.

use crate::config::EngineConfig;
use crate::{ReasonCode, SignalFact, TriggeredReason};
use std::collections::BTreeSet;

/// Map facts to triggered reasons with their configured points.
///
/// Duplicate facts collapse; `custom_blacklist` triggers once per distinct
/// `(category, value)` match.
pub fn evaluate(facts: &[SignalFact], config: &EngineConfig) -> Vec<TriggeredReason> {
    let mut triggered: BTreeSet<ReasonKey> = BTreeSet::new();

    for fact in facts {
        let hit = match fact {
            SignalFact::DisposableEmail(true) => Some(ReasonKey::plain(ReasonCode::DisposableEmail)),
            SignalFact::KnownVpnOrProxy(true) => Some(ReasonKey::plain(ReasonCode::VpnIp)),
            SignalFact::TorExitNode(true) => Some(ReasonKey::plain(ReasonCode::TorExit)),
            SignalFact::HostingProvider(true) => Some(ReasonKey::plain(ReasonCode::BadIsp)),
            SignalFact::HighRiskCountry(true) => Some(ReasonKey::plain(ReasonCode::HighRiskCountry)),
            SignalFact::RepeatFromIp(count) if *count > config.repeat_ip_threshold => {
                Some(ReasonKey::plain(ReasonCode::MultipleFromIp))
            }
            SignalFact::OrgBlacklisted { category, value } => Some(ReasonKey {
                code: ReasonCode::CustomBlacklist,
                detail: Some(format!("{}:{}", category, value)),
            }),
            SignalFact::DisposableEmail(false)
            | SignalFact::KnownVpnOrProxy(false)
            | SignalFact::TorExitNode(false)
            | SignalFact::HostingProvider(false)
            | SignalFact::HighRiskCountry(false)
            | SignalFact::RepeatFromIp(_) => None,
        };

        if let Some(key) = hit {
            triggered.insert(key);
        }
    }

    triggered
        .into_iter()
        .map(|key| TriggeredReason {
            code: key.code,
            points: config.weights.points(key.code),
            detail: key.detail,
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct ReasonKey {
    code: ReasonCode,
    detail: Option<String>,
}

impl ReasonKey {
    fn plain(code: ReasonCode) -> Self {
        Self { code, detail: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_lookups::BlacklistCategory;

    fn codes(reasons: &[TriggeredReason]) -> Vec<ReasonCode> {
        reasons.iter().map(|r| r.code).collect()
    }

    #[test]
    fn test_boolean_rules() {
        let config = EngineConfig::default();
        let facts = vec![
            SignalFact::DisposableEmail(true),
            SignalFact::KnownVpnOrProxy(false),
            SignalFact::TorExitNode(true),
            SignalFact::HostingProvider(true),
            SignalFact::HighRiskCountry(false),
        ];

        let reasons = evaluate(&facts, &config);
        let codes = codes(&reasons);
        assert_eq!(codes.len(), 3);
        assert!(codes.contains(&ReasonCode::DisposableEmail));
        assert!(codes.contains(&ReasonCode::TorExit));
        assert!(codes.contains(&ReasonCode::BadIsp));
    }

    #[test]
    fn test_repeat_threshold_is_exclusive() {
        let config = EngineConfig::default();

        assert!(evaluate(&[SignalFact::RepeatFromIp(5)], &config).is_empty());

        let reasons = evaluate(&[SignalFact::RepeatFromIp(6)], &config);
        assert_eq!(codes(&reasons), vec![ReasonCode::MultipleFromIp]);
        assert_eq!(reasons[0].points, 30);
    }

    #[test]
    fn test_blacklist_once_per_distinct_match() {
        let config = EngineConfig::default();
        let domain = SignalFact::OrgBlacklisted {
            category: BlacklistCategory::EmailDomain,
            value: "evil.example".to_string(),
        };
        let ip = SignalFact::OrgBlacklisted {
            category: BlacklistCategory::Ip,
            value: "203.0.113.9".to_string(),
        };

        let reasons = evaluate(&[domain.clone(), ip, domain], &config);
        assert_eq!(reasons.len(), 2);
        assert!(reasons.iter().all(|r| r.code == ReasonCode::CustomBlacklist));
        assert_eq!(reasons[0].detail.as_deref(), Some("email_domain:evil.example"));
    }

    #[test]
    fn test_duplicate_facts_collapse() {
        let config = EngineConfig::default();
        let facts = vec![SignalFact::TorExitNode(true), SignalFact::TorExitNode(true)];
        assert_eq!(evaluate(&facts, &config).len(), 1);
    }

    #[test]
    fn test_missing_facts_trigger_nothing() {
        assert!(evaluate(&[], &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_points_follow_weight_table() {
        let mut config = EngineConfig::default();
        config.weights.tor_exit = 15;

        let reasons = evaluate(&[SignalFact::TorExitNode(true)], &config);
        assert_eq!(reasons[0].points, 15);
    }
}
