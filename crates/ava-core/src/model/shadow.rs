// crates/ava-core/src/model/shadow.rs
// ============================================================================
// Module: Shadow Comparison
// Description: Parallel production/shadow evaluation outcomes, recorded per
//              evaluation when shadow mode is enabled.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::InterventionId;
use crate::identifiers::SessionId;
use crate::identifiers::ShadowComparisonId;
use crate::identifiers::SiteUrl;
use crate::model::evaluation::Decision;
use crate::model::evaluation::GateOverride;
use crate::model::evaluation::MswimResult;

/// One half (production or shadow) of a [`ShadowComparison`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSide {
    /// The MSWIM outcome on this side.
    pub result: MswimResult,
}

/// A side-by-side comparison of a production evaluation against a shadow
/// evaluation run with synthesized hints, recorded per evaluation when
/// shadow mode is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowComparison {
    /// Unique identifier.
    pub id: ShadowComparisonId,
    /// Session the comparison was recorded for.
    pub session_id: SessionId,
    /// Site the session belongs to.
    pub site_url: SiteUrl,
    /// Intervention the production side is linked to, if the evaluation
    /// fired one.
    pub production_intervention_id: Option<InterventionId>,
    /// Production-path outcome.
    pub production: ShadowSide,
    /// Shadow-path outcome.
    pub shadow: ShadowSide,
    /// `|production.composite - shadow.composite|`.
    pub composite_divergence: f64,
    /// Whether the two sides resolved to the same tier.
    pub tier_match: bool,
    /// Whether the two sides reached the same fire/suppress decision.
    pub decision_match: bool,
    /// Whether the two sides' gate overrides match (including both `None`).
    pub gate_override_match: bool,
    /// Instant the comparison was recorded.
    pub recorded_at: OffsetDateTime,
}

impl ShadowComparison {
    /// Builds a comparison from the two sides, computing the derived
    /// divergence and match fields.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Mirrors the pair of recorded evaluation outcomes plus identity.")]
    pub fn from_sides(
        id: ShadowComparisonId,
        session_id: SessionId,
        site_url: SiteUrl,
        production_intervention_id: Option<InterventionId>,
        production: ShadowSide,
        shadow: ShadowSide,
        recorded_at: OffsetDateTime,
    ) -> Self {
        let composite_divergence =
            (production.result.composite_score - shadow.result.composite_score).abs();
        let tier_match = production.result.tier == shadow.result.tier;
        let decision_match = matches_decision(production.result.decision, shadow.result.decision);
        let gate_override_match =
            matches_override(production.result.gate_override, shadow.result.gate_override);
        Self {
            id,
            session_id,
            site_url,
            production_intervention_id,
            production,
            shadow,
            composite_divergence,
            tier_match,
            decision_match,
            gate_override_match,
            recorded_at,
        }
    }
}

fn matches_decision(a: Decision, b: Decision) -> bool {
    a == b
}

fn matches_override(a: Option<GateOverride>, b: Option<GateOverride>) -> bool {
    a == b
}
