//! Property tests for rule evaluation and aggregation

use proptest::prelude::*;
use risk_engine::rules::evaluate;
use risk_engine::scoring::MAX_SCORE;
use risk_engine::{aggregate, ActionPolicy, EngineConfig, ReasonCode, RiskLevel, SignalFact, TriggeredReason};
use signal_lookups::BlacklistCategory;

fn reason_code() -> impl Strategy<Value = ReasonCode> {
    prop::sample::select(ReasonCode::ALL.to_vec())
}

fn triggered_reason() -> impl Strategy<Value = TriggeredReason> {
    (reason_code(), 0u8..=100, prop::option::of("[a-z]{1,6}")).prop_map(|(code, points, detail)| {
        TriggeredReason {
            code,
            points,
            detail,
        }
    })
}

fn category() -> impl Strategy<Value = BlacklistCategory> {
    prop::sample::select(vec![
        BlacklistCategory::EmailDomain,
        BlacklistCategory::Ip,
        BlacklistCategory::Isp,
        BlacklistCategory::Asn,
    ])
}

fn signal_fact() -> impl Strategy<Value = SignalFact> {
    prop_oneof![
        any::<bool>().prop_map(SignalFact::DisposableEmail),
        any::<bool>().prop_map(SignalFact::KnownVpnOrProxy),
        any::<bool>().prop_map(SignalFact::TorExitNode),
        any::<bool>().prop_map(SignalFact::HostingProvider),
        any::<bool>().prop_map(SignalFact::HighRiskCountry),
        (0u64..20).prop_map(SignalFact::RepeatFromIp),
        (category(), "[a-z]{1,4}")
            .prop_map(|(category, value)| SignalFact::OrgBlacklisted { category, value }),
    ]
}

proptest! {
    #[test]
    fn aggregate_is_clamped_and_consistent(reasons in prop::collection::vec(triggered_reason(), 0..12)) {
        let total: u32 = reasons.iter().map(|r| u32::from(r.points)).sum();
        let result = aggregate(reasons, &ActionPolicy::default());

        prop_assert!(result.score <= MAX_SCORE);
        prop_assert_eq!(u32::from(result.score), total.min(100));
        prop_assert_eq!(result.risk_level, RiskLevel::from_score(result.score));
        prop_assert_eq!(result.action, ActionPolicy::default().action_for(result.risk_level));
    }

    #[test]
    fn aggregate_ignores_input_order(reasons in prop::collection::vec(triggered_reason(), 0..12)) {
        let mut reversed = reasons.clone();
        reversed.reverse();

        let forward = aggregate(reasons, &ActionPolicy::default());
        let backward = aggregate(reversed, &ActionPolicy::default());
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn reasons_are_sorted_by_points(reasons in prop::collection::vec(triggered_reason(), 0..12)) {
        let result = aggregate(reasons, &ActionPolicy::default());
        for pair in result.reasons.windows(2) {
            prop_assert!(pair[0].points >= pair[1].points);
        }
    }

    #[test]
    fn evaluation_is_deterministic(facts in prop::collection::vec(signal_fact(), 0..16)) {
        let config = EngineConfig::default();
        let mut shuffled = facts.clone();
        shuffled.reverse();

        let first = aggregate(evaluate(&facts, &config), &ActionPolicy::default());
        let second = aggregate(evaluate(&shuffled, &config), &ActionPolicy::default());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn each_code_fires_at_most_once_except_blacklist(facts in prop::collection::vec(signal_fact(), 0..16)) {
        let reasons = evaluate(&facts, &EngineConfig::default());
        for code in ReasonCode::ALL {
            if code == ReasonCode::CustomBlacklist {
                continue;
            }
            prop_assert!(reasons.iter().filter(|r| r.code == code).count() <= 1);
        }
    }
}
