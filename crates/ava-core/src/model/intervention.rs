// crates/ava-core/src/model/intervention.rs
// ============================================================================
// Module: Intervention
// Description: A fired (or payload-built) intervention and its monotonic
//              status state machine.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::identifiers::EvaluationId;
use crate::identifiers::FrictionId;
use crate::identifiers::InterventionId;
use crate::identifiers::SessionId;
use crate::model::evaluation::Tier;

/// The tier an intervention was fired at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    /// Non-intrusive, no message.
    Passive,
    /// A light nudge.
    Nudge,
    /// A more assertive intervention.
    Active,
    /// An escalation, always includes a handoff context snapshot.
    Escalate,
}

impl InterventionType {
    /// The [`Tier`] this intervention type corresponds to.
    #[must_use]
    pub const fn as_tier(self) -> Tier {
        match self {
            Self::Passive => Tier::Passive,
            Self::Nudge => Tier::Nudge,
            Self::Active => Tier::Active,
            Self::Escalate => Tier::Escalate,
        }
    }
}

/// Delivery/outcome status of an [`Intervention`].
///
/// # State machine
/// `Sent -> Delivered -> {Dismissed | Converted | Ignored}`. `Delivered` may
/// be skipped if a terminal outcome arrives first. Transitions are
/// monotonic; see [`InterventionStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    /// Dispatched to the widget, not yet confirmed rendered.
    Sent,
    /// Confirmed rendered in the widget.
    Delivered,
    /// The visitor dismissed the intervention.
    Dismissed,
    /// The visitor completed the associated goal action.
    Converted,
    /// The intervention was shown but drew no response within its window.
    Ignored,
}

impl InterventionStatus {
    /// Returns `true` if this status is one of the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dismissed | Self::Converted | Self::Ignored)
    }

    /// Returns the rank used to enforce monotonic progression; a transition
    /// is valid only if `to.rank() > self.rank()`, with the one exception
    /// that `Sent` may jump directly to a terminal state.
    const fn rank(self) -> u8 {
        match self {
            Self::Sent => 0,
            Self::Delivered => 1,
            Self::Dismissed | Self::Converted | Self::Ignored => 2,
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is a valid,
    /// monotonic progression.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() > self.rank()
    }
}

/// A fired (or payload-built) intervention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    /// Unique identifier.
    pub id: InterventionId,
    /// Session this intervention was fired for.
    pub session_id: SessionId,
    /// Evaluation that produced the fire decision.
    pub evaluation_id: EvaluationId,
    /// Tier the intervention was fired at.
    pub intervention_type: InterventionType,
    /// Friction id the intervention addresses, if any.
    pub friction_id: Option<FrictionId>,
    /// Compile-time action registry key, e.g. `"cart_reminder"`.
    pub action_code: String,
    /// Rendered message, absent for passive interventions.
    pub message: Option<String>,
    /// Composite score at fire time.
    pub mswim_score: f64,
    /// Tier at fire time (equal to `intervention_type.as_tier()` absent a
    /// later override; recorded separately per the data model).
    pub tier_at_fire: Tier,
    /// Structured payload delivered to the widget.
    pub payload: Value,
    /// Instant the intervention was created.
    pub created_at: OffsetDateTime,
    /// Current delivery/outcome status.
    pub status: InterventionStatus,
    /// Conversion action recorded on a `Converted` outcome.
    pub conversion_action: Option<String>,
    /// Instant `status` was last updated.
    pub status_updated_at: OffsetDateTime,
}

impl Intervention {
    /// Attempts to transition to `next`, rejecting a non-monotonic
    /// regression. Returns `true` if the transition was applied.
    pub fn try_transition(&mut self, next: InterventionStatus, at: OffsetDateTime) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.status_updated_at = at;
        true
    }
}
