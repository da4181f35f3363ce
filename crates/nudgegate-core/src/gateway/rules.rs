//! Stateless admission rules and the server-owned cost table.

use crate::model::{
    Action, ActionType, Context, DecisionOutcome, GatewayDecision, Mode, ReasonCode, RiskLevel,
};

/// Confidence below this is treated as malformed generator output; a
/// missing confidence field decodes to 0.0 and lands here.
const MIN_VALID_CONFIDENCE: f64 = 0.1;

/// A real intervention below this confidence is judged low-quality.
const QUALITY_CONFIDENCE_FLOOR: f64 = 0.35;

/// First static rule: malformed generator output. Returns the reason
/// naming the invalid field.
pub(crate) fn validate(action: &Action) -> Option<ReasonCode> {
    if action.action_type == ActionType::Unknown {
        return Some(ReasonCode::InvalidActionType);
    }
    if action.risk_level == RiskLevel::Unknown {
        return Some(ReasonCode::InvalidRiskLevel);
    }
    if action.confidence.is_nan()
        || action.confidence < MIN_VALID_CONFIDENCE
        || action.confidence > 1.0
    {
        return Some(ReasonCode::InvalidConfidence);
    }
    None
}

/// The one rule nothing can override.
pub(crate) fn is_high_risk(action: &Action) -> bool {
    action.risk_level == RiskLevel::High
}

pub(crate) fn is_low_quality(action: &Action) -> bool {
    action.action_type.is_intervention() && action.confidence < QUALITY_CONFIDENCE_FLOOR
}

pub(crate) fn silent_override(ctx: &Context, action: &Action) -> bool {
    ctx.mode == Mode::Silent && action.action_type.is_intervention()
}

/// Fixed price per action type. The generator's self-declared cost is
/// never consulted: an untrusted component must not set its own price.
pub fn action_cost(action_type: ActionType) -> f64 {
    match action_type {
        ActionType::DoNotDisturb => 0.0,
        ActionType::Encourage => 1.5,
        ActionType::RestReminder => 2.0,
        ActionType::Reframe => 2.5,
        ActionType::TaskBreakdown => 3.0,
        ActionType::Unknown => 1.0,
    }
}

/// The most expensive entry in the cost table; used to pre-gate
/// auto-suggestions before the generator runs.
pub fn max_action_cost() -> f64 {
    3.0
}

/// Degrades a rejected candidate to the safe no-op action. The reason
/// code travels in the decision; user-facing text is rendered at the
/// presentation boundary.
pub(crate) fn reject(
    original: &Action,
    outcome: DecisionOutcome,
    reason: ReasonCode,
) -> (Action, GatewayDecision) {
    let decision = GatewayDecision {
        outcome,
        reason,
        overridden_action_type: Some(original.action_type),
    };
    (Action::do_not_disturb(""), decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(action_type: ActionType, confidence: f64, risk: RiskLevel) -> Action {
        Action {
            action_type,
            message: "msg".into(),
            confidence,
            cost: 0.0,
            risk_level: risk,
        }
    }

    #[test]
    fn validate_flags_each_field() {
        let action = candidate(ActionType::Unknown, 0.9, RiskLevel::Low);
        assert_eq!(validate(&action), Some(ReasonCode::InvalidActionType));

        let action = candidate(ActionType::Encourage, 0.9, RiskLevel::Unknown);
        assert_eq!(validate(&action), Some(ReasonCode::InvalidRiskLevel));

        let action = candidate(ActionType::Encourage, 1.2, RiskLevel::Low);
        assert_eq!(validate(&action), Some(ReasonCode::InvalidConfidence));

        let action = candidate(ActionType::Encourage, f64::NAN, RiskLevel::Low);
        assert_eq!(validate(&action), Some(ReasonCode::InvalidConfidence));

        // A missing confidence field decodes to 0.0 and is invalid.
        let action = candidate(ActionType::Encourage, 0.0, RiskLevel::Low);
        assert_eq!(validate(&action), Some(ReasonCode::InvalidConfidence));

        let action = candidate(ActionType::Encourage, 0.9, RiskLevel::Low);
        assert_eq!(validate(&action), None);
    }

    #[test]
    fn quality_floor_spares_the_noop() {
        let weak = candidate(ActionType::TaskBreakdown, 0.2, RiskLevel::Low);
        assert!(is_low_quality(&weak));

        let noop = candidate(ActionType::DoNotDisturb, 0.2, RiskLevel::Low);
        assert!(!is_low_quality(&noop));

        let confident = candidate(ActionType::TaskBreakdown, 0.8, RiskLevel::Low);
        assert!(!is_low_quality(&confident));
    }

    #[test]
    fn cost_table_is_fixed() {
        assert_eq!(action_cost(ActionType::DoNotDisturb), 0.0);
        assert_eq!(action_cost(ActionType::Encourage), 1.5);
        assert_eq!(action_cost(ActionType::RestReminder), 2.0);
        assert_eq!(action_cost(ActionType::Reframe), 2.5);
        assert_eq!(action_cost(ActionType::TaskBreakdown), 3.0);
        assert_eq!(max_action_cost(), 3.0);
    }

    #[test]
    fn reject_produces_noop_with_original_type() {
        let original = candidate(ActionType::RestReminder, 0.9, RiskLevel::Low);
        let (final_action, decision) = reject(
            &original,
            DecisionOutcome::Override,
            ReasonCode::BudgetExhausted,
        );
        assert_eq!(final_action.action_type, ActionType::DoNotDisturb);
        assert_eq!(decision.outcome, DecisionOutcome::Override);
        assert_eq!(decision.reason, ReasonCode::BudgetExhausted);
        assert_eq!(
            decision.overridden_action_type,
            Some(ActionType::RestReminder)
        );
    }
}
