// crates/ava-engine/src/payload.rs
// ============================================================================
// Module: Intervention Payload Builder
// Description: Maps (tier, friction id) to an action code and a structured
//              widget payload via a compile-time registry.
// ============================================================================

//! The registry below is content data, not logic, in the same spirit as
//! [`ava_core::signals::friction_catalog`]: a representative slice of
//! (tier, friction-prefix) entries with a per-tier default for everything
//! the table doesn't cover.

use ava_core::identifiers::FrictionId;
use ava_core::model::evaluation::Tier;
use ava_core::model::intervention::InterventionType;
use ava_core::model::training_datapoint::SessionContextSnapshot;
use serde_json::Value;
use serde_json::json;

/// One entry in the static action-code registry.
struct RegistryEntry {
    tier: Tier,
    friction_prefix: &'static str,
    action_code: &'static str,
    message: &'static str,
    cta_label: &'static str,
    cta_action: &'static str,
}

/// A representative slice of the published action registry; unmatched
/// (tier, friction) pairs fall back to [`default_for_tier`].
const REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        tier: Tier::Nudge,
        friction_prefix: "F03",
        action_code: "clarify_sizing",
        message: "Need help picking a size? We can walk you through it.",
        cta_label: "Get sizing help",
        cta_action: "open_size_guide",
    },
    RegistryEntry {
        tier: Tier::Nudge,
        friction_prefix: "F06",
        action_code: "shipping_reassurance",
        message: "Free shipping kicks in once you're a little closer to the threshold.",
        cta_label: "See shipping details",
        cta_action: "open_shipping_info",
    },
    RegistryEntry {
        tier: Tier::Active,
        friction_prefix: "F07",
        action_code: "offer_comparison",
        message: "Not sure which one's right? Here's a side-by-side.",
        cta_label: "Compare options",
        cta_action: "open_comparison",
    },
    RegistryEntry {
        tier: Tier::Active,
        friction_prefix: "F08",
        action_code: "stock_alternatives",
        message: "That item is low on stock. Here are close alternatives in stock now.",
        cta_label: "View alternatives",
        cta_action: "open_alternatives",
    },
    RegistryEntry {
        tier: Tier::Escalate,
        friction_prefix: "F09",
        action_code: "checkout_assist_handoff",
        message: "It looks like checkout isn't going smoothly. We've flagged this for a live assist.",
        cta_label: "Talk to support",
        cta_action: "open_live_assist",
    },
    RegistryEntry {
        tier: Tier::Escalate,
        friction_prefix: "F10",
        action_code: "payment_failure_handoff",
        message: "Your payment didn't go through. We've flagged this for a live assist.",
        cta_label: "Talk to support",
        cta_action: "open_live_assist",
    },
];

/// Returns the per-tier default action code, message (absent for passive),
/// cta label, and cta action used when no registry entry matches.
const fn default_for_tier(tier: Tier) -> (&'static str, Option<&'static str>, Option<&'static str>, Option<&'static str>) {
    match tier {
        Tier::Monitor | Tier::Passive => ("passive_ui_hint", None, None, None),
        Tier::Nudge => (
            "gentle_nudge",
            Some("We noticed you might have a question — happy to help."),
            Some("Get help"),
            Some("open_help_widget"),
        ),
        Tier::Active => (
            "proactive_assist",
            Some("Still deciding? Let us help you finish up."),
            Some("Show me options"),
            Some("open_assist_panel"),
        ),
        Tier::Escalate => (
            "escalate_handoff",
            Some("We've flagged your session for a live assist."),
            Some("Talk to support"),
            Some("open_live_assist"),
        ),
    }
}

fn lookup(tier: Tier, friction_id: Option<&FrictionId>) -> (&'static str, Option<&'static str>, Option<&'static str>, Option<&'static str>) {
    if let Some(friction_id) = friction_id {
        let id = friction_id.as_str();
        if let Some(entry) = REGISTRY.iter().find(|entry| entry.tier == tier && id.starts_with(entry.friction_prefix)) {
            return (entry.action_code, Some(entry.message), Some(entry.cta_label), Some(entry.cta_action));
        }
    }
    default_for_tier(tier)
}

/// A built intervention payload: the action code and message to store on
/// the [`ava_core::model::intervention::Intervention`] row, and the
/// structured JSON payload delivered to the widget.
pub struct BuiltPayload {
    /// Compile-time action registry key.
    pub action_code: String,
    /// Rendered message; always `None` for a passive intervention.
    pub message: Option<String>,
    /// Structured payload handed to the widget/dashboard.
    pub payload: Value,
}

/// Builds the intervention payload for `intervention_type` addressing
/// `friction_id` (if any), given `context`.
///
/// Passive payloads never carry a message. Escalate payloads always
/// include a handoff context snapshot, regardless of whether a registry
/// entry matched.
#[must_use]
pub fn build_payload(
    intervention_type: InterventionType,
    friction_id: Option<&FrictionId>,
    context: &SessionContextSnapshot,
) -> BuiltPayload {
    let tier = intervention_type.as_tier();
    let (action_code, message, cta_label, cta_action) = lookup(tier, friction_id);

    let message = if matches!(intervention_type, InterventionType::Passive) {
        None
    } else {
        message.map(str::to_owned)
    };

    let mut payload = json!({
        "type": intervention_type,
        "actionCode": action_code,
        "pageType": context.page_type,
    });

    match intervention_type {
        InterventionType::Passive => {
            payload["uiAdjustment"] = json!({ "highlightFrictionId": friction_id.map(FrictionId::as_str) });
        }
        InterventionType::Nudge => {
            payload["ctaLabel"] = json!(cta_label);
            payload["ctaAction"] = json!(cta_action);
        }
        InterventionType::Active => {
            payload["ctaLabel"] = json!(cta_label);
            payload["ctaAction"] = json!(cta_action);
            payload["products"] = json!([]);
            payload["comparison"] = Value::Null;
        }
        InterventionType::Escalate => {
            payload["ctaLabel"] = json!(cta_label);
            payload["ctaAction"] = json!(cta_action);
            payload["handoffContext"] = json!({
                "siteUrl": context.site_url,
                "deviceType": context.device_type,
                "referrerType": context.referrer_type,
                "isLoggedIn": context.is_logged_in,
                "isRepeatVisitor": context.is_repeat_visitor,
                "cartValue": context.cart_value,
                "cartItemCount": context.cart_item_count,
                "sessionAgeSec": context.session_age_sec,
                "pageType": context.page_type,
                "frictionId": friction_id.map(FrictionId::as_str),
            });
        }
    }

    BuiltPayload {
        action_code: action_code.to_owned(),
        message,
        payload,
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

    use ava_core::model::event::DeviceType;
    use ava_core::model::event::PageType;
    use ava_core::model::event::ReferrerType;

    use super::build_payload;
    use super::InterventionType;
    use ava_core::identifiers::FrictionId;
    use ava_core::model::training_datapoint::SessionContextSnapshot;

    fn sample_context() -> SessionContextSnapshot {
        SessionContextSnapshot {
            site_url: "https://example.com".into(),
            device_type: DeviceType::Desktop,
            referrer_type: ReferrerType::Direct,
            is_logged_in: false,
            is_repeat_visitor: false,
            cart_value: 120.0,
            cart_item_count: 2,
            session_age_sec: 300,
            page_type: PageType::Cart,
        }
    }

    #[test]
    fn passive_payload_never_carries_a_message() {
        let built = build_payload(InterventionType::Passive, Some(&FrictionId::from("F012")), &sample_context());
        assert!(built.message.is_none());
    }

    #[test]
    fn escalate_payload_always_includes_handoff_context() {
        let built = build_payload(InterventionType::Escalate, None, &sample_context());
        assert!(built.payload.get("handoffContext").is_some());
    }

    #[test]
    fn matching_friction_prefix_selects_registry_entry() {
        let built = build_payload(InterventionType::Nudge, Some(&FrictionId::from("F068")), &sample_context());
        assert_eq!(built.action_code, "shipping_reassurance");
    }

    #[test]
    fn unmatched_friction_falls_back_to_tier_default() {
        let built = build_payload(InterventionType::Active, Some(&FrictionId::from("F999")), &sample_context());
        assert_eq!(built.action_code, "proactive_assist");
    }
}
