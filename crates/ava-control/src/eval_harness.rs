// crates/ava-control/src/eval_harness.rs
// ============================================================================
// Module: Evaluation Harness
// Description: Pinned golden-case regression check for the MSWIM engine,
//              run nightly so a scoring-config or engine change that shifts
//              a known scenario's tier or decision is caught automatically.
// ============================================================================

//! Each [`GoldenCase`] pins a `(SessionEvalContext, RawHints)` pair against
//! an expected `(Tier, Decision)`. The cases themselves are adapted from
//! `ava_core::mswim_engine`'s own unit tests, since those scenarios are
//! already the documented reference behavior for a cart-abandonment nudge
//! and a dismissal-capped suppression.

use std::collections::BTreeSet;

use ava_core::gates::GateContext;
use ava_core::model::event::PageType;
use ava_core::model::event::ReferrerType;
use ava_core::model::evaluation::Decision;
use ava_core::model::evaluation::Tier;
use ava_core::model::scoring_config::ScoringConfig;
use ava_core::model::session::SessionFlags;
use ava_core::mswim_engine::RawHints;
use ava_core::mswim_engine::SessionEvalContext;
use ava_core::mswim_engine::run_mswim;
use ava_core::signals::ClarityContext;
use ava_core::signals::IntentContext;
use ava_core::signals::ReceptivityContext;
use ava_core::signals::ValueContext;

/// One pinned `(context, hints) -> (tier, decision)` scenario.
struct GoldenCase {
    /// Human-readable scenario name, surfaced in a failure report.
    name: &'static str,
    /// Session context the scenario evaluates under.
    ctx: SessionEvalContext,
    /// Raw signal hints fed into `run_mswim`.
    hints: RawHints,
    /// Tier the scenario must resolve to.
    expected_tier: Tier,
    /// Decision the scenario must resolve to.
    expected_decision: Decision,
}

/// One golden case's outcome: the scenario name plus what actually came
/// back, populated only when it diverges from its expectation.
#[derive(Debug, Clone)]
pub struct Regression {
    /// Name of the scenario that regressed.
    pub case_name: &'static str,
    /// Tier the scenario resolved to.
    pub actual_tier: Tier,
    /// Decision the scenario resolved to.
    pub actual_decision: Decision,
}

fn cart_abandonment_ctx() -> SessionEvalContext {
    SessionEvalContext {
        intent: IntentContext { page_type: PageType::Cart, is_logged_in: false, is_repeat_visitor: false, cart_value: 129.99, cart_item_count: 2 },
        detected_friction_ids: Vec::new(),
        clarity: ClarityContext { session_age_sec: 180, event_count: 6, rule_based_corroboration: false },
        receptivity: ReceptivityContext {
            total_interventions_fired: 0,
            total_dismissals: 0,
            seconds_since_last_intervention: None,
            is_mobile: false,
            widget_opened_voluntarily: false,
            idle_seconds: 20,
        },
        value: ValueContext { cart_value: 129.99, is_logged_in: false, is_repeat_visitor: false, referrer_type: ReferrerType::Direct },
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

fn golden_cases() -> Vec<GoldenCase> {
    let mut dismissal_capped = cart_abandonment_ctx();
    dismissal_capped.gate.total_dismissals = 3;
    dismissal_capped.receptivity.total_dismissals = 3;

    vec![
        GoldenCase {
            name: "cart_abandonment_fires_nudge",
            ctx: cart_abandonment_ctx(),
            hints: RawHints { intent: 45, friction: 15, clarity: 55, receptivity: 70, value: 45 },
            expected_tier: Tier::Nudge,
            expected_decision: Decision::Fire,
        },
        GoldenCase {
            name: "dismissal_cap_suppresses_high_composite",
            ctx: dismissal_capped,
            hints: RawHints { intent: 80, friction: 80, clarity: 80, receptivity: 80, value: 80 },
            expected_tier: Tier::Escalate,
            expected_decision: Decision::Suppress,
        },
    ]
}

/// Runs every golden case against `config`, returning the cases whose
/// outcome diverges from its pinned expectation.
#[must_use]
pub fn run_regression_check(config: &ScoringConfig) -> Vec<Regression> {
    golden_cases()
        .into_iter()
        .filter_map(|case| {
            let result = run_mswim(case.hints, config, &case.ctx);
            if result.tier == case.expected_tier && result.decision == case.expected_decision {
                None
            } else {
                Some(Regression { case_name: case.name, actual_tier: result.tier, actual_decision: result.decision })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::run_regression_check;
    use ava_core::model::scoring_config::ScoringConfig;

    #[test]
    fn builtin_default_config_passes_every_golden_case() {
        let config = ScoringConfig::builtin_default();
        let regressions = run_regression_check(&config);
        assert!(regressions.is_empty(), "unexpected regressions: {regressions:?}");
    }
}
