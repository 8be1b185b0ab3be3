//! Score aggregation

use crate::{Action, RiskLevel, ScoreResult, TriggeredReason};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound of the reported score
pub const MAX_SCORE: u8 = 100;

/// Level to action table. Overrides replace the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Score in [0, 30)
    pub none: Action,
    /// Score in [30, 60)
    pub low: Action,
    /// Score in [60, 80)
    pub medium: Action,
    /// Score in [80, 100]
    pub high: Action,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            none: Action::Allow,
            low: Action::Monitor,
            medium: Action::Challenge,
            high: Action::Block,
        }
    }
}

impl ActionPolicy {
    /// Action for `level`
    pub fn action_for(&self, level: RiskLevel) -> Action {
        match level {
            RiskLevel::None => self.none,
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }
}

/// Canonical reason order: points descending, then reason code, then detail.
pub fn canonical_order(a: &TriggeredReason, b: &TriggeredReason) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.code.as_str().cmp(b.code.as_str()))
        .then_with(|| a.detail.cmp(&b.detail))
}

/// Turn triggered reasons into the final result.
///
/// Pure: the output depends only on the set of reasons and the policy, not
/// on the order they arrive in.
pub fn aggregate(mut reasons: Vec<TriggeredReason>, policy: &ActionPolicy) -> ScoreResult {
    reasons.sort_by(canonical_order);

    let total: u32 = reasons.iter().map(|r| u32::from(r.points)).sum();
    let score = total.min(u32::from(MAX_SCORE)) as u8;
    let risk_level = RiskLevel::from_score(score);
    let action = policy.action_for(risk_level);

    ScoreResult {
        reasons,
        score,
        risk_level,
        action,
        message: action.message().to_string(),
    }
}
