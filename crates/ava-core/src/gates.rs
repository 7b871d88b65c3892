// crates/ava-core/src/gates.rs
// ============================================================================
// Module: Gate Engine
// Description: Twelve ordered override rules producing at most one
//              suppress / force-passive / force-escalate override.
// ============================================================================

//! Rules are evaluated in fixed order; the first match wins. See each
//! `GateRule` variant's doc comment for its exact trigger condition, which
//! mirrors the numbered rule list in the system design.

use crate::identifiers::FrictionId;
use crate::model::evaluation::GateOverride;
use crate::model::evaluation::Tier;
use crate::model::scoring_config::GateConfig;
use crate::model::session::SessionFlags;

/// The narrow slice of session state the gate engine reads. Distinct from
/// [`crate::model::session::SessionRunningCounters`] so gate evaluation can
/// be tested without constructing a full session.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Session age in seconds.
    pub session_age_sec: u64,
    /// Total dismissals recorded this session.
    pub total_dismissals: u32,
    /// Friction ids detected in the current evaluation's context window.
    pub current_friction_ids: Vec<FrictionId>,
    /// Friction ids already intervened on this session.
    pub friction_ids_already_intervened: std::collections::BTreeSet<FrictionId>,
    /// Seconds since the last `active`-tier intervention, if any fired.
    pub seconds_since_last_active: Option<u64>,
    /// Seconds since the last `nudge`-tier intervention, if any fired.
    pub seconds_since_last_nudge: Option<u64>,
    /// Total `active`-tier interventions fired this session.
    pub total_active: u32,
    /// Total `nudge`-tier interventions fired this session.
    pub total_nudges: u32,
    /// Total interventions fired at a tier other than `passive` or
    /// `monitor`.
    pub total_non_passive: u32,
    /// Condition flags derived from recent events.
    pub flags: SessionFlags,
}

/// Runs the twelve gate rules, in order, against `tier`, returning the
/// first match.
#[must_use]
pub fn evaluate_gates(tier: Tier, config: &GateConfig, ctx: &GateContext) -> Option<GateOverride> {
    // 1. SESSION_TOO_YOUNG
    if ctx.session_age_sec < config.min_session_age_sec && tier != Tier::Escalate {
        return Some(GateOverride::SessionTooYoung);
    }
    // 2. DISMISS_CAP
    if ctx.total_dismissals >= config.dismissals_to_suppress {
        return Some(GateOverride::DismissCap);
    }
    // 3. DUPLICATE_FRICTION
    if tier < Tier::Escalate
        && ctx
            .current_friction_ids
            .iter()
            .any(|id| ctx.friction_ids_already_intervened.contains(id))
    {
        return Some(GateOverride::DuplicateFriction);
    }
    // 4. COOLDOWN_ACTIVE
    if tier < Tier::Escalate
        && ctx
            .seconds_since_last_active
            .is_some_and(|secs| secs < config.cooldown_after_active_sec)
    {
        return Some(GateOverride::CooldownActive);
    }
    // 5. COOLDOWN_NUDGE (emitted as COOLDOWN_ACTIVE)
    if tier <= Tier::Nudge
        && ctx
            .seconds_since_last_nudge
            .is_some_and(|secs| secs < config.cooldown_after_nudge_sec)
    {
        return Some(GateOverride::CooldownActive);
    }
    // 6. SESSION_CAP
    if session_cap_reached(tier, config, ctx) {
        return Some(GateOverride::SessionCap);
    }
    // 7. FORCE_PASSIVE_TECHNICAL
    if ctx.flags.has_technical_error && tier > Tier::Passive {
        return Some(GateOverride::ForcePassiveTechnical);
    }
    // 8. FORCE_PASSIVE_OOS
    if ctx.flags.has_out_of_stock && tier > Tier::Passive {
        return Some(GateOverride::ForcePassiveOos);
    }
    // 9. FORCE_PASSIVE_SHIPPING
    if ctx.flags.has_shipping_issue && tier > Tier::Passive {
        return Some(GateOverride::ForcePassiveShipping);
    }
    // 10. FORCE_ESCALATE_PAYMENT
    if ctx.flags.has_payment_failure {
        return Some(GateOverride::ForceEscalatePayment);
    }
    // 11. FORCE_ESCALATE_CHECKOUT_TIMEOUT
    if ctx.flags.has_checkout_timeout {
        return Some(GateOverride::ForceEscalateCheckoutTimeout);
    }
    // 12. FORCE_ESCALATE_HELP_SEARCH
    if ctx.flags.has_help_search {
        return Some(GateOverride::ForceEscalateHelpSearch);
    }
    None
}

fn session_cap_reached(tier: Tier, config: &GateConfig, ctx: &GateContext) -> bool {
    let tier_specific_cap_reached = match tier {
        Tier::Active => ctx.total_active >= config.active_cap_per_session,
        Tier::Nudge => ctx.total_nudges >= config.nudge_cap_per_session,
        Tier::Passive | Tier::Monitor | Tier::Escalate => false,
    };
    let non_passive_cap_reached = !matches!(tier, Tier::Passive | Tier::Monitor)
        && ctx.total_non_passive >= config.non_passive_cap_per_session;
    tier_specific_cap_reached || non_passive_cap_reached
}

/// Applies a resolved override to `tier`, returning the (possibly retiered)
/// tier and final decision.
///
/// `suppress` ⇒ decision=suppress (tier unchanged); `force_passive` ⇒
/// tier:=PASSIVE, decision=fire; `force_escalate` ⇒ tier:=ESCALATE,
/// decision=fire; no override ⇒ decision=fire iff tier > MONITOR else
/// suppress.
#[must_use]
pub fn apply_override(
    tier: Tier,
    gate_override: Option<GateOverride>,
) -> (Tier, crate::model::evaluation::Decision) {
    use crate::model::evaluation::Decision;

    match gate_override {
        Some(
            GateOverride::SessionTooYoung
            | GateOverride::DismissCap
            | GateOverride::DuplicateFriction
            | GateOverride::CooldownActive
            | GateOverride::SessionCap,
        ) => (tier, Decision::Suppress),
        Some(
            GateOverride::ForcePassiveTechnical
            | GateOverride::ForcePassiveOos
            | GateOverride::ForcePassiveShipping,
        ) => (Tier::Passive, Decision::Fire),
        Some(
            GateOverride::ForceEscalatePayment
            | GateOverride::ForceEscalateCheckoutTimeout
            | GateOverride::ForceEscalateHelpSearch,
        ) => (Tier::Escalate, Decision::Fire),
        None => {
            let decision = if tier > Tier::Monitor { Decision::Fire } else { Decision::Suppress };
            (tier, decision)
        }
    }
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

    use super::GateContext;
    use super::apply_override;
    use super::evaluate_gates;
    use crate::model::evaluation::Decision;
    use crate::model::evaluation::GateOverride;
    use crate::model::evaluation::Tier;
    use crate::model::scoring_config::GateConfig;
    use crate::model::session::SessionFlags;

    fn base_ctx() -> GateContext {
        GateContext {
            session_age_sec: 120,
            total_dismissals: 0,
            current_friction_ids: Vec::new(),
            friction_ids_already_intervened: BTreeSet::new(),
            seconds_since_last_active: None,
            seconds_since_last_nudge: None,
            total_active: 0,
            total_nudges: 0,
            total_non_passive: 0,
            flags: SessionFlags::default(),
        }
    }

    #[test]
    fn dismiss_cap_suppresses() {
        let config = GateConfig::defaults();
        let mut ctx = base_ctx();
        ctx.total_dismissals = 3;
        let result = evaluate_gates(Tier::Nudge, &config, &ctx);
        assert_eq!(result, Some(GateOverride::DismissCap));
        assert_eq!(apply_override(Tier::Nudge, result).1, Decision::Suppress);
    }

    #[test]
    fn force_escalate_payment_overrides_low_tier() {
        let config = GateConfig::defaults();
        let mut ctx = base_ctx();
        ctx.flags.has_payment_failure = true;
        let result = evaluate_gates(Tier::Monitor, &config, &ctx);
        assert_eq!(result, Some(GateOverride::ForceEscalatePayment));
        let (tier, decision) = apply_override(Tier::Monitor, result);
        assert_eq!(tier, Tier::Escalate);
        assert_eq!(decision, Decision::Fire);
    }

    #[test]
    fn session_too_young_does_not_fire_at_escalate() {
        let config = GateConfig::defaults();
        let mut ctx = base_ctx();
        ctx.session_age_sec = 20;
        let result = evaluate_gates(Tier::Escalate, &config, &ctx);
        assert_eq!(result, None);
        assert_eq!(apply_override(Tier::Escalate, result).1, Decision::Fire);
    }

    #[test]
    fn session_exactly_min_age_is_not_too_young() {
        let config = GateConfig::defaults();
        let mut ctx = base_ctx();
        ctx.session_age_sec = config.min_session_age_sec;
        let result = evaluate_gates(Tier::Nudge, &config, &ctx);
        assert_ne!(result, Some(GateOverride::SessionTooYoung));
    }

    #[test]
    fn no_override_and_monitor_tier_suppresses() {
        let config = GateConfig::defaults();
        let ctx = base_ctx();
        let result = evaluate_gates(Tier::Monitor, &config, &ctx);
        assert_eq!(result, None);
        assert_eq!(apply_override(Tier::Monitor, result).1, Decision::Suppress);
    }
}
