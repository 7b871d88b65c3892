// crates/ava-engine/src/outcome.rs
// ============================================================================
// Module: Outcome Recorder
// Description: Validates status progression on an outcome message and, on
//              reaching a terminal status, assembles the training datapoint.
// ============================================================================

//! An outcome message updates an [`Intervention`]'s status and, once that
//! status is terminal, triggers exactly-once assembly of a
//! [`TrainingDatapoint`] from the intervention, its evaluation, and a fresh
//! session snapshot.

use std::sync::Arc;

use ava_core::identifiers::InterventionId;
use ava_core::identifiers::SessionId;
use ava_core::identifiers::TrainingDatapointId;
use ava_core::model::event::PageType;
use ava_core::model::intervention::Intervention;
use ava_core::model::intervention::InterventionStatus;
use ava_core::model::training_datapoint::OutcomeLabel;
use ava_core::model::training_datapoint::SessionContextSnapshot;
use ava_core::model::training_datapoint::TrainingDatapoint;
use ava_core::repo::EvaluationRepo;
use ava_core::repo::EvaluationRepoError;
use ava_core::repo::InterventionRepo;
use ava_core::repo::InterventionRepoError;
use ava_core::repo::SessionRepo;
use ava_core::repo::SessionRepoError;
use ava_core::repo::TrainingDatapointRepo;
use ava_core::repo::TrainingDatapointRepoError;
use thiserror::Error;
use time::OffsetDateTime;

use crate::ids::IdGenerator;

/// An inbound outcome update for a fired intervention.
#[derive(Debug, Clone)]
pub struct OutcomeMessage {
    /// Intervention this outcome concerns.
    pub intervention_id: InterventionId,
    /// Session the intervention belongs to.
    pub session_id: SessionId,
    /// Newly reported status.
    pub status: InterventionStatus,
    /// Conversion action, present only when `status == Converted`.
    pub conversion_action: Option<String>,
    /// Instant the outcome was reported.
    pub timestamp: OffsetDateTime,
}

/// Failure modes of [`OutcomeRecorder::record`].
#[derive(Debug, Error)]
pub enum OutcomeError {
    /// No intervention matches the message's `intervention_id`.
    #[error("intervention not found")]
    InterventionNotFound,
    /// The reported status is not a valid progression from the
    /// intervention's current status.
    #[error("status transition rejected as a non-monotonic regression")]
    InvalidTransition,
    /// A repository call failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<InterventionRepoError> for OutcomeError {
    fn from(value: InterventionRepoError) -> Self {
        match value {
            InterventionRepoError::NotFound => Self::InterventionNotFound,
            InterventionRepoError::InvalidTransition => Self::InvalidTransition,
            InterventionRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<EvaluationRepoError> for OutcomeError {
    fn from(value: EvaluationRepoError) -> Self {
        match value {
            EvaluationRepoError::NotFound => Self::Store("evaluation not found".to_owned()),
            EvaluationRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<SessionRepoError> for OutcomeError {
    fn from(value: SessionRepoError) -> Self {
        match value {
            SessionRepoError::NotFound => Self::Store("session not found".to_owned()),
            SessionRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<TrainingDatapointRepoError> for OutcomeError {
    fn from(value: TrainingDatapointRepoError) -> Self {
        match value {
            TrainingDatapointRepoError::Store(message) => Self::Store(message),
        }
    }
}

/// Maps a terminal [`InterventionStatus`] to the [`OutcomeLabel`] recorded
/// on the training datapoint.
///
/// # Panics
/// Panics if `status` is not one of the three terminal statuses; callers
/// must check [`InterventionStatus::is_terminal`] first.
fn outcome_label(status: InterventionStatus) -> OutcomeLabel {
    match status {
        InterventionStatus::Dismissed => OutcomeLabel::Dismissed,
        InterventionStatus::Converted => OutcomeLabel::Converted,
        InterventionStatus::Ignored => OutcomeLabel::Ignored,
        InterventionStatus::Sent | InterventionStatus::Delivered => {
            unreachable!("caller must only invoke outcome_label on a terminal status")
        }
    }
}

/// Validates and applies outcome updates, assembling a [`TrainingDatapoint`]
/// exactly once per intervention when its status reaches a terminal state.
pub struct OutcomeRecorder {
    intervention_repo: Arc<dyn InterventionRepo>,
    evaluation_repo: Arc<dyn EvaluationRepo>,
    session_repo: Arc<dyn SessionRepo>,
    datapoint_repo: Arc<dyn TrainingDatapointRepo>,
    datapoint_ids: IdGenerator,
}

impl OutcomeRecorder {
    /// Builds a recorder from its collaborating repositories.
    #[must_use]
    pub fn new(
        intervention_repo: Arc<dyn InterventionRepo>,
        evaluation_repo: Arc<dyn EvaluationRepo>,
        session_repo: Arc<dyn SessionRepo>,
        datapoint_repo: Arc<dyn TrainingDatapointRepo>,
    ) -> Self {
        Self {
            intervention_repo,
            evaluation_repo,
            session_repo,
            datapoint_repo,
            datapoint_ids: IdGenerator::new("tdp"),
        }
    }

    /// Applies `message` to its intervention, rejecting a non-monotonic
    /// regression and silently ignoring a duplicate terminal report.
    /// Assembles and persists a training datapoint if the update reached a
    /// terminal status for the first time.
    ///
    /// # Errors
    /// Returns [`OutcomeError::InterventionNotFound`] if no intervention
    /// matches, [`OutcomeError::InvalidTransition`] if the reported status
    /// regresses a non-terminal intervention, or [`OutcomeError::Store`] on
    /// a repository failure.
    pub async fn record(&self, message: OutcomeMessage) -> Result<(), OutcomeError> {
        let intervention = self.intervention_repo.get(&message.intervention_id).await?;

        if intervention.status.is_terminal() {
            // A terminal intervention receiving another terminal report is
            // a duplicate; anything else is a regression. Both fail
            // `can_transition_to`, so they are indistinguishable from the
            // state machine alone.
            return if intervention.status == message.status { Ok(()) } else { Err(OutcomeError::InvalidTransition) };
        }
        if !intervention.status.can_transition_to(message.status) {
            return Err(OutcomeError::InvalidTransition);
        }

        self.intervention_repo.update_status(&message.intervention_id, message.status, message.timestamp).await?;

        if message.status.is_terminal() {
            self.assemble_datapoint(&intervention, &message).await?;
        }
        Ok(())
    }

    /// Builds and persists the training datapoint for a newly terminal
    /// intervention. `TrainingDatapointRepo::create` is idempotent on
    /// `intervention_id`, so a retried or duplicate call is harmless.
    async fn assemble_datapoint(&self, intervention: &Intervention, message: &OutcomeMessage) -> Result<(), OutcomeError> {
        let evaluation = self.evaluation_repo.get(&intervention.evaluation_id).await?;
        let session = self.session_repo.get(&intervention.session_id).await?;

        let outcome_delay_ms = u64::try_from((message.timestamp - intervention.created_at).whole_milliseconds()).unwrap_or(0);

        let detected_frictions = intervention.friction_id.clone().map_or_else(Vec::new, |id| vec![id]);

        let session_context = SessionContextSnapshot {
            site_url: session.site_url,
            device_type: session.device_type,
            referrer_type: session.referrer_type,
            is_logged_in: session.is_logged_in,
            is_repeat_visitor: session.is_repeat_visitor,
            cart_value: session.cart_value,
            cart_item_count: session.cart_item_count,
            session_age_sec: session.age_seconds(message.timestamp),
            page_type: intervention
                .payload
                .get("pageType")
                .and_then(|value| serde_json::from_value::<PageType>(value.clone()).ok())
                .unwrap_or(PageType::Other),
        };

        let datapoint = TrainingDatapoint {
            id: TrainingDatapointId::from(self.datapoint_ids.issue()),
            intervention_id: intervention.id.clone(),
            session_id: intervention.session_id.clone(),
            session_context,
            narrative: None,
            detected_frictions,
            signals: evaluation.result.signals,
            composite_score: evaluation.result.composite_score,
            weights_used: evaluation.result.weights_used,
            decision: evaluation.result.decision,
            gate_override: evaluation.result.gate_override,
            intervention_type: intervention.intervention_type,
            action_code: intervention.action_code.clone(),
            friction_id: intervention.friction_id.clone(),
            outcome: outcome_label(message.status),
            conversion_action: message.conversion_action.clone(),
            outcome_delay_ms,
            created_at: message.timestamp,
            tier_at_fire: intervention.tier_at_fire,
        };

        self.datapoint_repo.create(datapoint).await?;
        Ok(())
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

    use super::outcome_label;
    use ava_core::model::intervention::InterventionStatus;
    use ava_core::model::training_datapoint::OutcomeLabel;

    #[test]
    fn dismissed_status_maps_to_dismissed_label() {
        assert_eq!(outcome_label(InterventionStatus::Dismissed), OutcomeLabel::Dismissed);
    }

    #[test]
    #[should_panic(expected = "terminal status")]
    fn non_terminal_status_panics() {
        outcome_label(InterventionStatus::Sent);
    }
}
