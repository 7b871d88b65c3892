// crates/ava-core/src/mswim_engine.rs
// ============================================================================
// Module: MSWIM Engine
// Description: Orchestrates signal adjustment, composite+tier resolution,
//              and gate evaluation into one evaluation result.
// ============================================================================

//! `run_mswim` is pure and deterministic given its inputs; the config read
//! it depends on happens before this function is called, not inside it, so
//! this module performs no I/O.

use crate::composite::compute_composite;
use crate::composite::resolve_tier;
use crate::gates::GateContext;
use crate::gates::apply_override;
use crate::gates::evaluate_gates;
use crate::model::evaluation::Decision;
use crate::model::evaluation::MswimResult;
use crate::model::evaluation::MswimSignals;
use crate::model::scoring_config::ScoringConfig;
use crate::signals::ClarityContext;
use crate::signals::IntentContext;
use crate::signals::ReceptivityContext;
use crate::signals::ValueContext;
use crate::signals::adjust_clarity;
use crate::signals::adjust_friction;
use crate::signals::adjust_intent;
use crate::signals::compute_receptivity;
use crate::signals::compute_value;

/// Raw 0-100 hints for the five signals, from either the generative model
/// or the shadow synthesizer.
#[derive(Debug, Clone, Copy)]
pub struct RawHints {
    /// Raw intent hint.
    pub intent: u8,
    /// Raw friction hint.
    pub friction: u8,
    /// Raw clarity hint.
    pub clarity: u8,
    /// Raw receptivity hint.
    pub receptivity: u8,
    /// Raw value hint.
    pub value: u8,
}

/// The full session context `run_mswim` needs across every adjuster and the
/// gate engine.
#[derive(Debug, Clone)]
pub struct SessionEvalContext {
    /// Intent adjuster context.
    pub intent: IntentContext,
    /// Friction ids detected in the current context window.
    pub detected_friction_ids: Vec<crate::identifiers::FrictionId>,
    /// Clarity adjuster context.
    pub clarity: ClarityContext,
    /// Receptivity adjuster context.
    pub receptivity: ReceptivityContext,
    /// Value adjuster context.
    pub value: ValueContext,
    /// Gate engine context.
    pub gate: GateContext,
}

/// Runs the full MSWIM pipeline: adjusts each signal, computes the
/// composite and tier, evaluates the gate engine, and applies any override.
#[must_use]
pub fn run_mswim(hints: RawHints, config: &ScoringConfig, ctx: &SessionEvalContext) -> MswimResult {
    let signals = MswimSignals::new(
        i32::from(adjust_intent(hints.intent, ctx.intent)),
        i32::from(adjust_friction(hints.friction, &ctx.detected_friction_ids)),
        i32::from(adjust_clarity(hints.clarity, ctx.clarity)),
        i32::from(compute_receptivity(hints.receptivity, ctx.receptivity)),
        i32::from(compute_value(hints.value, ctx.value)),
    );

    let composite_score = compute_composite(&signals, &config.weights);
    let base_tier = resolve_tier(composite_score, &config.tier_thresholds);
    let gate_override = evaluate_gates(base_tier, &config.gate_config, &ctx.gate);
    let (tier, decision) = apply_override(base_tier, gate_override);

    let reasoning = build_reasoning(composite_score, &signals, gate_override, decision);

    MswimResult {
        signals,
        weights_used: config.weights,
        composite_score,
        tier,
        gate_override,
        decision,
        reasoning,
    }
}

fn build_reasoning(
    composite_score: f64,
    signals: &MswimSignals,
    gate_override: Option<crate::model::evaluation::GateOverride>,
    decision: Decision,
) -> String {
    let override_text = gate_override.map_or_else(|| "none".to_owned(), |o| o.rule_id().to_owned());
    let decision_text = match decision {
        Decision::Fire => "fire",
        Decision::Suppress => "suppress",
    };
    format!(
        "composite={composite_score:.1} I={} F={} C={} R={} V={} override={override_text} decision={decision_text}",
        signals.intent, signals.friction, signals.clarity, signals.receptivity, signals.value,
    )
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::collections::BTreeSet;

    use super::RawHints;
    use super::SessionEvalContext;
    use super::run_mswim;
    use crate::gates::GateContext;
    use crate::model::event::PageType;
    use crate::model::event::ReferrerType;
    use crate::model::evaluation::Decision;
    use crate::model::evaluation::Tier;
    use crate::model::scoring_config::ScoringConfig;
    use crate::model::session::SessionFlags;
    use crate::signals::ClarityContext;
    use crate::signals::IntentContext;
    use crate::signals::ReceptivityContext;
    use crate::signals::ValueContext;

    fn cart_abandonment_ctx() -> SessionEvalContext {
        SessionEvalContext {
            intent: IntentContext {
                page_type: PageType::Cart,
                is_logged_in: false,
                is_repeat_visitor: false,
                cart_value: 129.99,
                cart_item_count: 2,
            },
            detected_friction_ids: Vec::new(),
            clarity: ClarityContext {
                session_age_sec: 180,
                event_count: 6,
                rule_based_corroboration: false,
            },
            receptivity: ReceptivityContext {
                total_interventions_fired: 0,
                total_dismissals: 0,
                seconds_since_last_intervention: None,
                is_mobile: false,
                widget_opened_voluntarily: false,
                idle_seconds: 20,
            },
            value: ValueContext {
                cart_value: 129.99,
                is_logged_in: false,
                is_repeat_visitor: false,
                referrer_type: ReferrerType::Direct,
            },
            gate: GateContext {
                session_age_sec: 180,
                total_dismissals: 0,
                current_friction_ids: Vec::new(),
                friction_ids_already_intervened: BTreeSet::new(),
                seconds_since_last_active: None,
                seconds_since_last_nudge: None,
                total_active: 0,
                total_nudges: 0,
                total_non_passive: 0,
                flags: SessionFlags::default(),
            },
        }
    }

    #[test]
    fn cart_abandonment_scenario_fires_nudge() {
        let config = ScoringConfig::builtin_default();
        let ctx = cart_abandonment_ctx();
        let hints = RawHints {
            intent: 45,
            friction: 15,
            clarity: 55,
            receptivity: 70,
            value: 45,
        };
        let result = run_mswim(hints, &config, &ctx);
        assert!(result.composite_score >= 50.0, "composite={}", result.composite_score);
        assert_eq!(result.tier, Tier::Nudge);
        assert_eq!(result.decision, Decision::Fire);
        assert_eq!(result.gate_override, None);
    }

    #[test]
    fn dismissal_cap_suppresses_high_composite() {
        let config = ScoringConfig::builtin_default();
        let mut ctx = cart_abandonment_ctx();
        ctx.gate.total_dismissals = 3;
        ctx.receptivity.total_dismissals = 3;
        let hints = RawHints {
            intent: 80,
            friction: 80,
            clarity: 80,
            receptivity: 80,
            value: 80,
        };
        let result = run_mswim(hints, &config, &ctx);
        assert_eq!(result.decision, Decision::Suppress);
        assert_eq!(
            result.gate_override,
            Some(crate::model::evaluation::GateOverride::DismissCap)
        );
    }
}
