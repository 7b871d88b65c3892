// crates/ava-core/src/model/training_datapoint.rs
// ============================================================================
// Module: Training Datapoint
// Description: Immutable (context, decision, outcome) tuple assembled once
//              an intervention reaches a terminal outcome.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::FrictionId;
use crate::identifiers::InterventionId;
use crate::identifiers::SessionId;
use crate::identifiers::SiteUrl;
use crate::identifiers::TrainingDatapointId;
use crate::model::event::DeviceType;
use crate::model::event::PageType;
use crate::model::event::ReferrerType;
use crate::model::evaluation::Decision;
use crate::model::evaluation::GateOverride;
use crate::model::evaluation::MswimSignals;
use crate::model::evaluation::Tier;
use crate::model::intervention::InterventionType;
use crate::model::scoring_config::SignalWeights;

/// Terminal outcome label recorded on a [`TrainingDatapoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    /// Intervention shown but never reached a terminal outcome; recorded on
    /// delivery timeout.
    DeliveredTimeout,
    /// The visitor dismissed the intervention.
    Dismissed,
    /// The visitor converted.
    Converted,
    /// The intervention drew no response within its window.
    Ignored,
}

/// Session context snapshotted at datapoint assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContextSnapshot {
    /// Site the session belongs to.
    pub site_url: SiteUrl,
    /// Device class.
    pub device_type: DeviceType,
    /// Referrer classification.
    pub referrer_type: ReferrerType,
    /// Whether the visitor was authenticated.
    pub is_logged_in: bool,
    /// Whether the visitor was a repeat visitor.
    pub is_repeat_visitor: bool,
    /// Cart value at evaluation time.
    pub cart_value: f64,
    /// Cart item count at evaluation time.
    pub cart_item_count: u32,
    /// Session age, in seconds, at evaluation time.
    pub session_age_sec: u64,
    /// Page type at evaluation time.
    pub page_type: PageType,
}

/// An immutable record joining the context, decision, and observed outcome
/// of a single intervention. Assembled exactly once per `interventionId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDatapoint {
    /// Unique identifier.
    pub id: TrainingDatapointId,
    /// Source intervention; creation is idempotent on this id.
    pub intervention_id: InterventionId,
    /// Session the intervention was fired for.
    pub session_id: SessionId,
    /// Snapshotted session context.
    pub session_context: SessionContextSnapshot,
    /// Narrative synthesized or returned by the generative path, if any.
    pub narrative: Option<String>,
    /// Friction ids detected in the evaluation's context window.
    pub detected_frictions: Vec<FrictionId>,
    /// The five adjusted signals at evaluation time.
    pub signals: MswimSignals,
    /// Weighted composite score.
    pub composite_score: f64,
    /// Weights used to compute the composite.
    pub weights_used: SignalWeights,
    /// Fire/suppress decision.
    pub decision: Decision,
    /// Gate override that fired, if any.
    pub gate_override: Option<GateOverride>,
    /// Intervention type fired.
    pub intervention_type: InterventionType,
    /// Compile-time action code fired.
    pub action_code: String,
    /// Friction id the intervention addressed, if any.
    pub friction_id: Option<FrictionId>,
    /// Terminal outcome label.
    pub outcome: OutcomeLabel,
    /// Conversion action, present only when `outcome == Converted`.
    pub conversion_action: Option<String>,
    /// Elapsed time between fire and terminal outcome, in milliseconds.
    pub outcome_delay_ms: u64,
    /// Instant this datapoint was assembled.
    pub created_at: OffsetDateTime,
    /// Tier the intervention was fired at.
    pub tier_at_fire: Tier,
}
