// crates/ava-core/src/model/evaluation.rs
// ============================================================================
// Module: MSWIM Evaluation
// Description: The five-signal vector, the composite+tier+decision result,
//              and the gate-override enum the gate engine may produce.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::EvaluationId;
use crate::identifiers::SessionId;
use crate::model::scoring_config::SignalWeights;

/// The five MSWIM signals, each an integer in `0..=100`.
///
/// # Invariants
/// - Every field lies in `0..=100`; [`MswimSignals::new`] clamps to enforce
///   this rather than rejecting out-of-range input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MswimSignals {
    /// Purchase-intent signal.
    pub intent: u8,
    /// Friction signal.
    pub friction: u8,
    /// Clarity signal.
    pub clarity: u8,
    /// Receptivity signal.
    pub receptivity: u8,
    /// Value signal.
    pub value: u8,
}

impl MswimSignals {
    /// Builds a signal vector, clamping each field into `0..=100`.
    #[must_use]
    pub fn new(intent: i32, friction: i32, clarity: i32, receptivity: i32, value: i32) -> Self {
        Self {
            intent: clamp_to_u8(intent),
            friction: clamp_to_u8(friction),
            clarity: clamp_to_u8(clarity),
            receptivity: clamp_to_u8(receptivity),
            value: clamp_to_u8(value),
        }
    }

    /// Computes the weighted composite score: `Σ weight_i × signal_i`.
    #[must_use]
    pub fn composite(&self, weights: &SignalWeights) -> f64 {
        f64::from(self.intent) * weights.intent
            + f64::from(self.friction) * weights.friction
            + f64::from(self.clarity) * weights.clarity
            + f64::from(self.receptivity) * weights.receptivity
            + f64::from(self.value) * weights.value
    }
}

/// Clamps a signed adjuster output into the valid `0..=100` signal range.
#[must_use]
pub fn clamp_to_u8(value: i32) -> u8 {
    value.clamp(0, 100).try_into().unwrap_or(100)
}

/// Tier resolved from the composite score via a [`crate::model::scoring_config::TierThresholds`]
/// lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Below the passive threshold; no intervention considered.
    Monitor,
    /// Eligible for a passive (non-intrusive) intervention.
    Passive,
    /// Eligible for a nudge-tier intervention.
    Nudge,
    /// Eligible for an active-tier intervention.
    Active,
    /// Eligible for an escalate-tier intervention.
    Escalate,
}

impl Tier {
    /// All tiers, ordered from lowest to highest.
    pub const ALL: [Self; 5] = [
        Self::Monitor,
        Self::Passive,
        Self::Nudge,
        Self::Active,
        Self::Escalate,
    ];
}

/// The gate rule that fired, identifying both the rule and the action it
/// took. At most one fires per evaluation; first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateOverride {
    /// Session younger than the configured minimum age.
    SessionTooYoung,
    /// Dismissal count reached the suppression threshold.
    DismissCap,
    /// A current friction id was already intervened on this session.
    DuplicateFriction,
    /// Within the post-active (or post-nudge) cooldown window.
    ///
    /// Emitted for both the `COOLDOWN_ACTIVE` and `COOLDOWN_NUDGE` source
    /// rules; see the gate engine's rule table for the distinction.
    CooldownActive,
    /// The resolved tier's per-session cap has been reached.
    SessionCap,
    /// Forced down to `PASSIVE` due to a technical error.
    ForcePassiveTechnical,
    /// Forced down to `PASSIVE` due to an out-of-stock condition.
    ForcePassiveOos,
    /// Forced down to `PASSIVE` due to a shipping issue.
    ForcePassiveShipping,
    /// Forced up to `ESCALATE` due to a payment failure.
    ForceEscalatePayment,
    /// Forced up to `ESCALATE` due to a checkout timeout.
    ForceEscalateCheckoutTimeout,
    /// Forced up to `ESCALATE` due to a help-search event.
    ForceEscalateHelpSearch,
}

impl GateOverride {
    /// The stable, machine-readable override id emitted in `reasoning` and
    /// telemetry, matching the rule names in the gate engine's table.
    #[must_use]
    pub const fn rule_id(self) -> &'static str {
        match self {
            Self::SessionTooYoung => "SESSION_TOO_YOUNG",
            Self::DismissCap => "DISMISS_CAP",
            Self::DuplicateFriction => "DUPLICATE_FRICTION",
            Self::CooldownActive => "COOLDOWN_ACTIVE",
            Self::SessionCap => "SESSION_CAP",
            Self::ForcePassiveTechnical => "FORCE_PASSIVE_TECHNICAL",
            Self::ForcePassiveOos => "FORCE_PASSIVE_OOS",
            Self::ForcePassiveShipping => "FORCE_PASSIVE_SHIPPING",
            Self::ForceEscalatePayment => "FORCE_ESCALATE_PAYMENT",
            Self::ForceEscalateCheckoutTimeout => "FORCE_ESCALATE_CHECKOUT_TIMEOUT",
            Self::ForceEscalateHelpSearch => "FORCE_ESCALATE_HELP_SEARCH",
        }
    }

    /// Returns `true` for the three rules that suppress rather than retier.
    #[must_use]
    pub const fn is_suppress(self) -> bool {
        matches!(
            self,
            Self::SessionTooYoung
                | Self::DismissCap
                | Self::DuplicateFriction
                | Self::CooldownActive
                | Self::SessionCap
        )
    }
}

/// Whether an evaluation resulted in an intervention firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// An intervention should be dispatched.
    Fire,
    /// No intervention is dispatched.
    Suppress,
}

/// The complete outcome of one MSWIM evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MswimResult {
    /// The five adjusted signals.
    pub signals: MswimSignals,
    /// The weights used to compute the composite.
    pub weights_used: SignalWeights,
    /// Weighted composite score, `0..=100`.
    pub composite_score: f64,
    /// Resolved tier after any gate override.
    pub tier: Tier,
    /// Gate rule that fired, if any.
    pub gate_override: Option<GateOverride>,
    /// Final fire/suppress decision.
    pub decision: Decision,
    /// Human-readable trace: composite, signals, override, decision.
    pub reasoning: String,
}

/// A persisted evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Unique identifier.
    pub id: EvaluationId,
    /// Session the evaluation was run for.
    pub session_id: SessionId,
    /// Instant the evaluation completed.
    pub evaluated_at: OffsetDateTime,
    /// The MSWIM outcome.
    pub result: MswimResult,
    /// Engine actually used to produce the hints (`llm`, `fast`, or `auto`
    /// downgraded to one of those).
    pub engine_used: String,
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::MswimSignals;
    use crate::model::scoring_config::SignalWeights;

    #[test]
    fn signals_clamp_out_of_range_inputs() {
        let signals = MswimSignals::new(-10, 150, 50, 50, 50);
        assert_eq!(signals.intent, 0);
        assert_eq!(signals.friction, 100);
    }

    #[test]
    fn composite_matches_weighted_sum() {
        let signals = MswimSignals::new(100, 0, 0, 0, 0);
        let weights = SignalWeights::defaults();
        let composite = signals.composite(&weights);
        assert!((composite - 25.0).abs() < f64::EPSILON);
    }
}
