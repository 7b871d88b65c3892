// crates/ava-core/src/repo.rs
// ============================================================================
// Module: Repository Contracts
// Description: The named abstractions the rest of the workspace consumes;
//              concrete storage (ava-store-sqlite) is external to this crate.
// ============================================================================

//! ## Overview
//! Every trait here is implemented exactly once in `ava-store-sqlite`. Each
//! carries its own `thiserror` error enum so a failure in, say,
//! `EventRepo::append` is typed distinctly from a failure in
//! `RolloutRepo::advance_stage`, and a default `readiness()` method so
//! callers (the job runner, the CLI) can probe store health without every
//! trait having to declare it explicitly.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::identifiers::DriftAlertId;
use crate::identifiers::DriftSnapshotId;
use crate::identifiers::EvaluationId;
use crate::identifiers::ExperimentId;
use crate::identifiers::FrictionId;
use crate::identifiers::InterventionId;
use crate::identifiers::JobRunId;
use crate::identifiers::RolloutId;
use crate::identifiers::ScoringConfigId;
use crate::identifiers::SessionId;
use crate::identifiers::SessionKey;
use crate::identifiers::ShadowComparisonId;
use crate::identifiers::SiteUrl;
use crate::identifiers::TrainingDatapointId;
use crate::identifiers::VisitorKey;
use crate::model::drift::DriftSnapshot;
use crate::model::drift::DriftAlert;
use crate::model::drift::WindowType;
use crate::model::evaluation::Evaluation;
use crate::model::event::TrackEvent;
use crate::model::experiment::Experiment;
use crate::model::intervention::Intervention;
use crate::model::intervention::InterventionStatus;
use crate::model::job_run::JobRun;
use crate::model::rollout::Rollout;
use crate::model::scoring_config::ScoringConfig;
use crate::model::session::Session;
use crate::model::training_datapoint::OutcomeLabel;
use crate::model::training_datapoint::TrainingDatapoint;

/// Error returned by a [`SessionRepo`] operation.
#[derive(Debug, Error)]
pub enum SessionRepoError {
    /// No session matches the given identity.
    #[error("session not found")]
    NotFound,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Session identity, lookup, and counter-update operations.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Inserts a new session or updates an existing one by `session_id`.
    async fn upsert(&self, session: Session) -> Result<(), SessionRepoError>;

    /// Looks up a session by its widget-supplied secondary key.
    async fn lookup_by(
        &self,
        visitor_key: &VisitorKey,
        session_key: &SessionKey,
    ) -> Result<Option<Session>, SessionRepoError>;

    /// Fetches a session by its primary identifier.
    async fn get(&self, session_id: &SessionId) -> Result<Session, SessionRepoError>;

    /// Lists sessions last seen at or after `since`.
    async fn list_since(&self, since: OffsetDateTime) -> Result<Vec<Session>, SessionRepoError>;

    /// Marks a session ended.
    async fn mark_ended(&self, session_id: &SessionId, at: OffsetDateTime) -> Result<(), SessionRepoError>;

    /// Persists an updated `running_counters` / cart snapshot for a session.
    async fn update(&self, session: Session) -> Result<(), SessionRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), SessionRepoError> {
        Ok(())
    }
}

/// Funnel-step counts keyed by page type, for the analytics surface.
#[derive(Debug, Clone, Default)]
pub struct FunnelStepCounts {
    /// `(page_type, count)` pairs in funnel order.
    pub steps: Vec<(String, u64)>,
}

/// Error returned by an [`EventRepo`] operation.
#[derive(Debug, Error)]
pub enum EventRepoError {
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Event append and read-side analytics operations. Analytics aggregates
/// are not on the hot evaluation path and may be backed by dedicated read
/// queries.
#[async_trait]
pub trait EventRepo: Send + Sync {
    /// Appends an immutable event.
    async fn append(&self, event: TrackEvent) -> Result<(), EventRepoError>;

    /// Lists the most recent `limit` events for a session, oldest first.
    async fn list_by_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<TrackEvent>, EventRepoError>;

    /// Aggregates funnel step counts for `site_url` within `[since, now]`.
    async fn funnel_step_counts(
        &self,
        site_url: &SiteUrl,
        since: OffsetDateTime,
    ) -> Result<FunnelStepCounts, EventRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), EventRepoError> {
        Ok(())
    }
}

/// Error returned by an [`EvaluationRepo`] operation.
#[derive(Debug, Error)]
pub enum EvaluationRepoError {
    /// No evaluation matches the given identifier.
    #[error("evaluation not found")]
    NotFound,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Persisted-evaluation create/read operations.
#[async_trait]
pub trait EvaluationRepo: Send + Sync {
    /// Persists a completed evaluation.
    async fn create(&self, evaluation: Evaluation) -> Result<(), EvaluationRepoError>;

    /// Fetches an evaluation by id.
    async fn get(&self, id: &EvaluationId) -> Result<Evaluation, EvaluationRepoError>;

    /// Lists evaluations for a session, most recent first.
    async fn get_by_session(&self, session_id: &SessionId) -> Result<Vec<Evaluation>, EvaluationRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), EvaluationRepoError> {
        Ok(())
    }
}

/// Error returned by an [`InterventionRepo`] operation.
#[derive(Debug, Error)]
pub enum InterventionRepoError {
    /// No intervention matches the given identifier.
    #[error("intervention not found")]
    NotFound,
    /// The requested status transition would regress the state machine.
    #[error("invalid status transition from current status")]
    InvalidTransition,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Intervention create/read/status-update operations, enforcing the
/// monotonic status state machine at the store boundary.
#[async_trait]
pub trait InterventionRepo: Send + Sync {
    /// Persists a newly fired intervention.
    async fn create(&self, intervention: Intervention) -> Result<(), InterventionRepoError>;

    /// Fetches an intervention by id.
    async fn get(&self, id: &InterventionId) -> Result<Intervention, InterventionRepoError>;

    /// Lists interventions for a session, most recent first.
    async fn get_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Intervention>, InterventionRepoError>;

    /// Lists interventions for a given status.
    async fn list(&self, status: Option<InterventionStatus>) -> Result<Vec<Intervention>, InterventionRepoError>;

    /// Updates `id`'s status, rejecting a non-monotonic transition.
    async fn update_status(
        &self,
        id: &InterventionId,
        next: InterventionStatus,
        at: OffsetDateTime,
    ) -> Result<(), InterventionRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), InterventionRepoError> {
        Ok(())
    }
}

/// Error returned by a [`ScoringConfigRepo`] operation.
#[derive(Debug, Error)]
pub enum ScoringConfigRepoError {
    /// No config matches the given identifier or scope.
    #[error("scoring config not found")]
    NotFound,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Scoring config lifecycle and active-config resolution.
#[async_trait]
pub trait ScoringConfigRepo: Send + Sync {
    /// Lists every config in a site's scope (or the global scope if `None`).
    async fn list(&self, site_url: Option<&SiteUrl>) -> Result<Vec<ScoringConfig>, ScoringConfigRepoError>;

    /// Fetches a config by id.
    async fn get(&self, id: &ScoringConfigId) -> Result<ScoringConfig, ScoringConfigRepoError>;

    /// Creates a new config.
    async fn create(&self, config: ScoringConfig) -> Result<(), ScoringConfigRepoError>;

    /// Updates an existing config's weights/thresholds/gate parameters.
    async fn update(&self, config: ScoringConfig) -> Result<(), ScoringConfigRepoError>;

    /// Activates `id`, deactivating any other active config in its scope.
    async fn activate(&self, id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError>;

    /// Deletes a config that is not currently active.
    async fn delete(&self, id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError>;

    /// Fetches the active config for `site_url`, falling back to the
    /// global active config.
    async fn get_active_config(&self, site_url: &SiteUrl) -> Result<ScoringConfig, ScoringConfigRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), ScoringConfigRepoError> {
        Ok(())
    }
}

/// Filters accepted by [`TrainingDatapointRepo::list`].
#[derive(Debug, Clone, Default)]
pub struct TrainingDatapointFilter {
    /// Restrict to a single outcome label.
    pub outcome: Option<OutcomeLabel>,
    /// Restrict to a single tier.
    pub tier: Option<crate::model::evaluation::Tier>,
    /// Restrict to a single site.
    pub site_url: Option<SiteUrl>,
    /// Restrict to a single friction id.
    pub friction_id: Option<FrictionId>,
    /// Restrict to datapoints created at or after this instant.
    pub since: Option<OffsetDateTime>,
    /// Restrict to datapoints created at or before this instant.
    pub until: Option<OffsetDateTime>,
}

/// A `(tier, outcome) -> count` cross-tabulation cell.
#[derive(Debug, Clone, Copy)]
pub struct TierOutcomeCell {
    /// Tier this cell counts.
    pub tier: crate::model::evaluation::Tier,
    /// Outcome label this cell counts.
    pub outcome: OutcomeLabel,
    /// Number of datapoints matching `(tier, outcome)`.
    pub count: u64,
}

/// Outcome distribution over a filtered set of datapoints.
#[derive(Debug, Clone, Default)]
pub struct OutcomeDistribution {
    /// `(outcome, count)` pairs.
    pub counts: Vec<(OutcomeLabel, u64)>,
}

/// Error returned by a [`TrainingDatapointRepo`] operation.
#[derive(Debug, Error)]
pub enum TrainingDatapointRepoError {
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Training-datapoint create (idempotent on `interventionId`) and
/// analytics-read operations.
#[async_trait]
pub trait TrainingDatapointRepo: Send + Sync {
    /// Inserts a datapoint, silently ignoring a duplicate
    /// `intervention_id`.
    async fn create(&self, datapoint: TrainingDatapoint) -> Result<(), TrainingDatapointRepoError>;

    /// Lists datapoints matching `filter`.
    async fn list(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<Vec<TrainingDatapoint>, TrainingDatapointRepoError>;

    /// Computes the outcome distribution over `filter`.
    async fn outcome_distribution(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<OutcomeDistribution, TrainingDatapointRepoError>;

    /// Computes the tier × outcome cross-tabulation over `filter`.
    async fn tier_outcome_cross_tab(
        &self,
        filter: &TrainingDatapointFilter,
    ) -> Result<Vec<TierOutcomeCell>, TrainingDatapointRepoError>;

    /// Counts datapoints matching `filter`.
    async fn count(&self, filter: &TrainingDatapointFilter) -> Result<u64, TrainingDatapointRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), TrainingDatapointRepoError> {
        Ok(())
    }
}

/// Filters accepted by [`ShadowComparisonRepo::list`].
#[derive(Debug, Clone, Default)]
pub struct ShadowComparisonFilter {
    /// Restrict to a single session.
    pub session_id: Option<SessionId>,
    /// Restrict to comparisons with a given tier-match outcome.
    pub tier_match: Option<bool>,
    /// Restrict to comparisons with a given decision-match outcome.
    pub decision_match: Option<bool>,
    /// Restrict to comparisons at or above this composite divergence.
    pub min_divergence: Option<f64>,
}

/// Aggregate statistics over a filtered set of shadow comparisons.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowComparisonStats {
    /// Number of comparisons aggregated.
    pub sample_size: u64,
    /// Mean composite divergence.
    pub avg_composite_divergence: f64,
    /// Fraction with matching tiers.
    pub tier_agreement_rate: f64,
    /// Fraction with matching decisions.
    pub decision_agreement_rate: f64,
}

/// Error returned by a [`ShadowComparisonRepo`] operation.
#[derive(Debug, Error)]
pub enum ShadowComparisonRepoError {
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Shadow-comparison create/read/stats operations, backing the drift
/// detector and the dashboard's divergence views.
#[async_trait]
pub trait ShadowComparisonRepo: Send + Sync {
    /// Persists a shadow comparison.
    async fn create(
        &self,
        comparison: crate::model::shadow::ShadowComparison,
    ) -> Result<(), ShadowComparisonRepoError>;

    /// Lists comparisons matching `filter`.
    async fn list(
        &self,
        filter: &ShadowComparisonFilter,
    ) -> Result<Vec<crate::model::shadow::ShadowComparison>, ShadowComparisonRepoError>;

    /// Computes aggregate statistics over `filter` within `[since, now]`.
    async fn stats(
        &self,
        site_url: Option<&SiteUrl>,
        since: OffsetDateTime,
    ) -> Result<ShadowComparisonStats, ShadowComparisonRepoError>;

    /// Lists the `limit` comparisons with the highest composite divergence
    /// within `[since, now]`.
    async fn top_divergences(
        &self,
        since: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<crate::model::shadow::ShadowComparison>, ShadowComparisonRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), ShadowComparisonRepoError> {
        Ok(())
    }
}

/// Error returned by a [`DriftSnapshotRepo`] or [`DriftAlertRepo`]
/// operation.
#[derive(Debug, Error)]
pub enum DriftRepoError {
    /// No record matches the given identifier.
    #[error("not found")]
    NotFound,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Drift-snapshot create/read/prune operations.
#[async_trait]
pub trait DriftSnapshotRepo: Send + Sync {
    /// Persists a computed snapshot.
    async fn create(&self, snapshot: DriftSnapshot) -> Result<(), DriftRepoError>;

    /// Lists snapshots of `window_type`, most recent first, optionally
    /// scoped to `site_url`.
    async fn list(
        &self,
        window_type: WindowType,
        site_url: Option<&SiteUrl>,
    ) -> Result<Vec<DriftSnapshot>, DriftRepoError>;

    /// Deletes snapshots with `window_end` older than `older_than`.
    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, DriftRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), DriftRepoError> {
        Ok(())
    }
}

/// Drift-alert create/read/acknowledge/prune operations.
#[async_trait]
pub trait DriftAlertRepo: Send + Sync {
    /// Persists a newly raised alert.
    async fn create(&self, alert: DriftAlert) -> Result<(), DriftRepoError>;

    /// Lists alerts, optionally restricted to unacknowledged-only.
    async fn list(&self, unacknowledged_only: bool) -> Result<Vec<DriftAlert>, DriftRepoError>;

    /// Finds an unacknowledged alert matching `(alert_type, site_url)`, for
    /// de-duplication.
    async fn find_unacknowledged(
        &self,
        alert_type: crate::model::drift::DriftAlertType,
        site_url: Option<&SiteUrl>,
    ) -> Result<Option<DriftAlert>, DriftRepoError>;

    /// Marks an alert acknowledged.
    async fn acknowledge(&self, id: &DriftAlertId, at: OffsetDateTime) -> Result<(), DriftRepoError>;

    /// Deletes alerts raised before `older_than`.
    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, DriftRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), DriftRepoError> {
        Ok(())
    }
}

/// Error returned by an [`ExperimentRepo`] or [`RolloutRepo`] operation.
#[derive(Debug, Error)]
pub enum ControlPlaneRepoError {
    /// No record matches the given identifier.
    #[error("not found")]
    NotFound,
    /// The requested mutation would violate a control-plane invariant
    /// (e.g. a second `rolling` rollout for the same site).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Experiment lifecycle CRUD.
#[async_trait]
pub trait ExperimentRepo: Send + Sync {
    /// Creates a new experiment.
    async fn create(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError>;

    /// Fetches an experiment by id.
    async fn get(&self, id: &ExperimentId) -> Result<Experiment, ControlPlaneRepoError>;

    /// Persists an updated experiment (status, variant weights, ...).
    async fn update(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), ControlPlaneRepoError> {
        Ok(())
    }
}

/// Rollout lifecycle CRUD plus the two control-plane-specific queries the
/// rollout controller needs.
#[async_trait]
pub trait RolloutRepo: Send + Sync {
    /// Creates a new rollout.
    async fn create(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError>;

    /// Fetches a rollout by id.
    async fn get(&self, id: &RolloutId) -> Result<Rollout, ControlPlaneRepoError>;

    /// Persists an updated rollout.
    async fn update(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError>;

    /// Lists every rollout currently in the `rolling` status.
    async fn list_rolling(&self) -> Result<Vec<Rollout>, ControlPlaneRepoError>;

    /// Fetches the single `rolling` rollout for `site_url`, if any.
    async fn get_active_rollout(&self, site_url: &SiteUrl) -> Result<Option<Rollout>, ControlPlaneRepoError>;

    /// Advances a rolling rollout to `stage_index`, failing if another
    /// writer already advanced it past that point.
    async fn advance_stage(&self, id: &RolloutId, stage_index: usize) -> Result<(), ControlPlaneRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), ControlPlaneRepoError> {
        Ok(())
    }
}

/// Error returned by a [`JobRunRepo`] operation.
#[derive(Debug, Error)]
pub enum JobRunRepoError {
    /// No job run matches the given identifier or name.
    #[error("job run not found")]
    NotFound,
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Job-run lifecycle create/complete/fail operations.
#[async_trait]
pub trait JobRunRepo: Send + Sync {
    /// Persists a newly started run.
    async fn create(&self, run: JobRun) -> Result<(), JobRunRepoError>;

    /// Persists a run transitioned to `completed`.
    async fn complete(&self, run: JobRun) -> Result<(), JobRunRepoError>;

    /// Persists a run transitioned to `failed`.
    async fn fail(&self, run: JobRun) -> Result<(), JobRunRepoError>;

    /// Fetches the most recent run of `job_name`, if any.
    async fn get_last_run(&self, job_name: &str) -> Result<Option<JobRun>, JobRunRepoError>;

    /// Deletes runs started before `older_than`.
    async fn prune_older_than(&self, older_than: OffsetDateTime) -> Result<u64, JobRunRepoError>;

    /// Checks whether the store backing this repository is reachable.
    async fn readiness(&self) -> Result<(), JobRunRepoError> {
        Ok(())
    }
}
