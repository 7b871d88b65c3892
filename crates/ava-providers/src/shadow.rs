// crates/ava-providers/src/shadow.rs
// ============================================================================
// Module: Shadow Hint Synthesizer
// Description: Deterministic rule-based hint synthesis used by the `fast`
//              engine and by shadow evaluation against the `llm` engine.
// ============================================================================

//! ## Overview
//! `synthesize_hints` has no teacher analog: it replaces a generative-model
//! call with a pure function of the same narrow context the signal
//! adjusters of `ava-core::signals` read, so the evaluator can run either
//! path through the identical adjuster+composite+gate pipeline. It performs
//! no I/O and is fully deterministic, which is what makes it usable both as
//! the `fast` engine and as the baseline the `llm` engine is compared
//! against.

use ava_core::identifiers::FrictionId;
use ava_core::model::event::PageType;
use ava_core::model::evaluation::clamp_to_u8;
use ava_core::mswim_engine::RawHints;
use ava_core::signals::max_catalog_severity;

/// Narrow context `synthesize_hints` reads. Deliberately a subset of
/// `ava_core::mswim_engine::SessionEvalContext`: the synthesizer only needs
/// enough to produce a soft prior, since the adjusters re-apply the full
/// session context afterward.
#[derive(Debug, Clone)]
pub struct ShadowContext {
    /// Page type at evaluation time.
    pub page_type: PageType,
    /// Friction ids detected in the current context window.
    pub detected_friction_ids: Vec<FrictionId>,
    /// Number of events in the current context window.
    pub event_count: usize,
    /// Session age in seconds.
    pub session_age_sec: u64,
    /// Current cart item count.
    pub cart_item_count: u32,
}

fn funnel_weight(page_type: PageType) -> i32 {
    match page_type {
        PageType::Landing => 0,
        PageType::Category => 3,
        PageType::SearchResults => 5,
        PageType::Pdp => 10,
        PageType::Cart => 14,
        PageType::Checkout => 18,
        PageType::Account | PageType::Other => 2,
    }
}

/// Synthesizes a [`RawHints`] record from `ctx` alone, with no generative
/// call. Each hint is a moderate baseline nudged by the narrow signals this
/// module has visibility into; the adjusters in `ava_core::signals` apply
/// the full session context on top.
#[must_use]
pub fn synthesize_hints(ctx: &ShadowContext) -> RawHints {
    let intent = clamp_to_u8(35 + funnel_weight(ctx.page_type) + i32::try_from(ctx.cart_item_count.min(10)).unwrap_or(10));

    let catalog_severity = max_catalog_severity(&ctx.detected_friction_ids);
    let friction = clamp_to_u8(i32::from(catalog_severity) / 2 + engagement_bonus(ctx.event_count));

    let clarity = clamp_to_u8(if ctx.session_age_sec < 60 { 45 } else { 60 });

    let receptivity = clamp_to_u8(60 - idle_penalty(ctx.event_count));

    let value = clamp_to_u8(40 + i32::try_from(ctx.cart_item_count.min(20)).unwrap_or(20));

    RawHints { intent, friction, clarity, receptivity, value }
}

fn engagement_bonus(event_count: usize) -> i32 {
    if event_count >= 5 { 10 } else { 0 }
}

fn idle_penalty(event_count: usize) -> i32 {
    if event_count <= 1 { 15 } else { 0 }
}
