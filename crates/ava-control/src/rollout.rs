// crates/ava-control/src/rollout.rs
// ============================================================================
// Module: Rollout Controller
// Description: The staged-rollout state machine and its health evaluation:
//              start/promote/pause/rollback plus automated health checks
//              driving the promote/rollback recommendation.
// ============================================================================

//! A [`Rollout`] stages a [`ChangeType`] behind a linked two-variant
//! experiment: `control` carries no override, `treatment` carries the
//! change. Promoting a stage re-weights that experiment to the next stage's
//! traffic percent; reaching the final stage (`percent == 100`) activates
//! the change and ends the experiment.
//!
//! Health evaluation reads the treatment-variant's outcome rates from
//! [`TrainingDatapointRepo::outcome_distribution`] scoped by `site_url` and
//! `since == rollout.started_at`. Nothing in this workspace attributes a
//! training datapoint to the experiment variant that produced it, so this is
//! a site-wide proxy for the treatment arm rather than a variant-exact
//! read; it is accurate when the stage's traffic share dominates the
//! site's sessions and approximate otherwise.

use std::sync::Arc;

use ava_core::clock::Clock;
use ava_core::clock::seconds_between;
use ava_core::identifiers::ExperimentId;
use ava_core::identifiers::RolloutId;
use ava_core::identifiers::VariantId;
use ava_core::model::experiment::Experiment;
use ava_core::model::experiment::ExperimentStatus;
use ava_core::model::experiment::Variant;
use ava_core::model::rollout::ChangeType;
use ava_core::model::rollout::HealthRecommendation;
use ava_core::model::rollout::Rollout;
use ava_core::model::rollout::RolloutStatus;
use ava_core::model::training_datapoint::OutcomeLabel;
use ava_core::repo::ControlPlaneRepoError;
use ava_core::repo::ExperimentRepo;
use ava_core::repo::OutcomeDistribution;
use ava_core::repo::RolloutRepo;
use ava_core::repo::ScoringConfigRepo;
use ava_core::repo::ScoringConfigRepoError;
use ava_core::repo::TrainingDatapointFilter;
use ava_core::repo::TrainingDatapointRepo;
use ava_core::repo::TrainingDatapointRepoError;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::ids::IdGenerator;

/// Fixed name of a rollout's linked experiment's unmodified arm.
const CONTROL_VARIANT_NAME: &str = "control";
/// Fixed name of a rollout's linked experiment's changed arm.
const TREATMENT_VARIANT_NAME: &str = "treatment";
/// Metric name recorded on every rollout-linked experiment.
const PRIMARY_METRIC: &str = "conversion_rate";

/// Failure modes of a [`RolloutController`] operation.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// No rollout or linked experiment matches the given identifier.
    #[error("rollout or linked experiment not found")]
    NotFound,
    /// The requested mutation would violate a control-plane invariant.
    #[error("rollout invariant violated: {0}")]
    InvariantViolation(String),
    /// The requested transition is not valid from the rollout's current
    /// status.
    #[error("requested transition is not valid from the rollout's current status")]
    InvalidTransition,
    /// A repository call failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<ControlPlaneRepoError> for RolloutError {
    fn from(value: ControlPlaneRepoError) -> Self {
        match value {
            ControlPlaneRepoError::NotFound => Self::NotFound,
            ControlPlaneRepoError::InvariantViolation(message) => Self::InvariantViolation(message),
            ControlPlaneRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<ScoringConfigRepoError> for RolloutError {
    fn from(value: ScoringConfigRepoError) -> Self {
        match value {
            ScoringConfigRepoError::NotFound => Self::Store("scoring config not found".to_owned()),
            ScoringConfigRepoError::Store(message) => Self::Store(message),
        }
    }
}

impl From<TrainingDatapointRepoError> for RolloutError {
    fn from(value: TrainingDatapointRepoError) -> Self {
        match value {
            TrainingDatapointRepoError::Store(message) => Self::Store(message),
        }
    }
}

/// Drives the rollout lifecycle and its automated health checks.
pub struct RolloutController {
    /// Rollout record store.
    rollout_repo: Arc<dyn RolloutRepo>,
    /// Linked-experiment record store.
    experiment_repo: Arc<dyn ExperimentRepo>,
    /// Scoring-config activation, for `ScoringConfig` rollout completion.
    scoring_config_repo: Arc<dyn ScoringConfigRepo>,
    /// Outcome-rate source for health evaluation.
    datapoint_repo: Arc<dyn TrainingDatapointRepo>,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
    /// Mints [`ExperimentId`]s for newly started rollouts.
    experiment_ids: IdGenerator,
    /// Mints [`VariantId`]s for a newly started rollout's two arms.
    variant_ids: IdGenerator,
}

impl RolloutController {
    /// Builds a controller from its collaborating repositories.
    #[must_use]
    pub fn new(
        rollout_repo: Arc<dyn RolloutRepo>,
        experiment_repo: Arc<dyn ExperimentRepo>,
        scoring_config_repo: Arc<dyn ScoringConfigRepo>,
        datapoint_repo: Arc<dyn TrainingDatapointRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rollout_repo,
            experiment_repo,
            scoring_config_repo,
            datapoint_repo,
            clock,
            experiment_ids: IdGenerator::new("exp"),
            variant_ids: IdGenerator::new("var"),
        }
    }

    /// Starts a `pending` rollout (creating its linked experiment at the
    /// first stage's traffic split) or resumes a `paused` one.
    ///
    /// # Errors
    /// Returns [`RolloutError::InvalidTransition`] from any other status,
    /// [`RolloutError::InvariantViolation`] if the rollout's stages are
    /// malformed or the site already has a rolling rollout, or
    /// [`RolloutError::Store`]/[`RolloutError::NotFound`] on a repository
    /// failure.
    pub async fn start(&self, rollout_id: &RolloutId) -> Result<Rollout, RolloutError> {
        let mut rollout = self.rollout_repo.get(rollout_id).await?;
        match rollout.status {
            RolloutStatus::Paused => {
                rollout.status = RolloutStatus::Rolling;
                self.rollout_repo.update(rollout.clone()).await?;
                Ok(rollout)
            }
            RolloutStatus::Pending => self.start_pending(rollout).await,
            RolloutStatus::Rolling | RolloutStatus::Completed | RolloutStatus::RolledBack => {
                Err(RolloutError::InvalidTransition)
            }
        }
    }

    /// Creates the linked experiment at the first stage's split and marks
    /// a `pending` rollout `rolling`.
    async fn start_pending(&self, mut rollout: Rollout) -> Result<Rollout, RolloutError> {
        if !rollout.has_valid_stages() {
            return Err(RolloutError::InvariantViolation("final stage must reach 100 percent".to_owned()));
        }
        if self.rollout_repo.get_active_rollout(&rollout.site_url).await?.is_some() {
            return Err(RolloutError::InvariantViolation(format!(
                "site {} already has a rolling rollout",
                rollout.site_url
            )));
        }
        let first_stage = rollout
            .current_stage()
            .ok_or_else(|| RolloutError::InvariantViolation("rollout has no stages".to_owned()))?;

        let now = self.clock.now();
        let experiment = self.build_linked_experiment(&rollout, first_stage.percent);
        self.experiment_repo.create(experiment.clone()).await?;

        rollout.experiment_id = Some(experiment.id);
        rollout.status = RolloutStatus::Rolling;
        rollout.started_at = Some(now);
        self.rollout_repo.update(rollout.clone()).await?;
        Ok(rollout)
    }

    /// Advances a `rolling` rollout to its next stage, re-weighting the
    /// linked experiment, or completes it if already at the final stage.
    ///
    /// # Errors
    /// Returns [`RolloutError::InvalidTransition`] if the rollout is not
    /// `rolling`, or a repository error if the store or the linked
    /// experiment cannot be read or written.
    pub async fn promote(&self, rollout_id: &RolloutId) -> Result<Rollout, RolloutError> {
        let mut rollout = self.rollout_repo.get(rollout_id).await?;
        if rollout.status != RolloutStatus::Rolling {
            return Err(RolloutError::InvalidTransition);
        }
        if rollout.is_final_stage() {
            return self.complete_rollout(rollout).await;
        }

        let next_index = rollout.current_stage + 1;
        let next_percent = rollout
            .stages
            .get(next_index)
            .ok_or_else(|| RolloutError::InvariantViolation("no next stage".to_owned()))?
            .percent;

        self.rollout_repo.advance_stage(rollout_id, next_index).await?;
        rollout.current_stage = next_index;
        self.reweight_experiment(&rollout, next_percent).await?;
        self.rollout_repo.update(rollout.clone()).await?;
        Ok(rollout)
    }

    /// Applies the final stage's durable effect (activating a scoring
    /// config, or nothing for an eval-engine change), ends the linked
    /// experiment, and marks the rollout `completed`.
    async fn complete_rollout(&self, mut rollout: Rollout) -> Result<Rollout, RolloutError> {
        match &rollout.change_type {
            ChangeType::ScoringConfig(id) => {
                self.scoring_config_repo.activate(id).await?;
            }
            // No repository exposes a "set the default eval engine" write;
            // an eval-engine rollout's only durable effect at completion is
            // ending its linked experiment.
            ChangeType::EvalEngine(_) => {}
        }
        self.end_linked_experiment(&rollout).await?;
        rollout.status = RolloutStatus::Completed;
        self.rollout_repo.update(rollout.clone()).await?;
        Ok(rollout)
    }

    /// Halts a `rolling` rollout without ending its experiment or touching
    /// the active configuration.
    ///
    /// # Errors
    /// Returns [`RolloutError::InvalidTransition`] if the rollout is not
    /// `rolling`.
    pub async fn pause(&self, rollout_id: &RolloutId) -> Result<Rollout, RolloutError> {
        let mut rollout = self.rollout_repo.get(rollout_id).await?;
        if rollout.status != RolloutStatus::Rolling {
            return Err(RolloutError::InvalidTransition);
        }
        rollout.status = RolloutStatus::Paused;
        self.rollout_repo.update(rollout.clone()).await?;
        Ok(rollout)
    }

    /// Aborts a non-terminal rollout, ending its linked experiment and
    /// leaving the active configuration unchanged. `reason` is for the
    /// caller's own audit trail; [`Rollout`] has no field to persist it on.
    ///
    /// # Errors
    /// Returns [`RolloutError::InvalidTransition`] if the rollout is already
    /// `completed` or `rolled_back`.
    pub async fn rollback(&self, rollout_id: &RolloutId, _reason: &str) -> Result<Rollout, RolloutError> {
        let mut rollout = self.rollout_repo.get(rollout_id).await?;
        if matches!(rollout.status, RolloutStatus::Completed | RolloutStatus::RolledBack) {
            return Err(RolloutError::InvalidTransition);
        }
        self.end_linked_experiment(&rollout).await?;
        rollout.status = RolloutStatus::RolledBack;
        self.rollout_repo.update(rollout.clone()).await?;
        Ok(rollout)
    }

    /// Marks the rollout's linked experiment `ended`, if it has one.
    async fn end_linked_experiment(&self, rollout: &Rollout) -> Result<(), RolloutError> {
        let Some(experiment_id) = rollout.experiment_id.clone() else {
            return Ok(());
        };
        let mut experiment = self.experiment_repo.get(&experiment_id).await?;
        experiment.status = ExperimentStatus::Ended;
        self.experiment_repo.update(experiment).await?;
        Ok(())
    }

    /// Re-weights the rollout's linked experiment's variants to
    /// `treatment_percent`.
    async fn reweight_experiment(&self, rollout: &Rollout, treatment_percent: u8) -> Result<(), RolloutError> {
        let Some(experiment_id) = rollout.experiment_id.clone() else {
            return Err(RolloutError::InvariantViolation("rolling rollout has no linked experiment".to_owned()));
        };
        let mut experiment = self.experiment_repo.get(&experiment_id).await?;
        apply_variant_weights(&mut experiment, treatment_percent);
        self.experiment_repo.update(experiment).await?;
        Ok(())
    }

    /// Builds the two-variant `control`/`treatment` experiment a rollout
    /// links to at start, with the treatment arm carrying the rollout's
    /// change and weighted at `treatment_percent`.
    fn build_linked_experiment(&self, rollout: &Rollout, treatment_percent: u8) -> Experiment {
        let (treatment_config, treatment_engine) = match &rollout.change_type {
            ChangeType::ScoringConfig(id) => (Some(id.clone()), None),
            ChangeType::EvalEngine(engine) => (None, Some(*engine)),
        };
        let treatment = Variant {
            id: VariantId::from(self.variant_ids.issue()),
            name: TREATMENT_VARIANT_NAME.to_owned(),
            weight: f64::from(treatment_percent) / 100.0,
            scoring_config_id: treatment_config,
            eval_engine: treatment_engine,
        };
        let control = Variant {
            id: VariantId::from(self.variant_ids.issue()),
            name: CONTROL_VARIANT_NAME.to_owned(),
            weight: 1.0 - treatment.weight,
            scoring_config_id: None,
            eval_engine: None,
        };
        Experiment {
            id: ExperimentId::from(self.experiment_ids.issue()),
            name: format!("{} rollout", rollout.name),
            site_url: Some(rollout.site_url.clone()),
            status: ExperimentStatus::Running,
            traffic_percent: 100,
            variants: vec![control, treatment],
            primary_metric: PRIMARY_METRIC.to_owned(),
        }
    }

    /// Evaluates the current stage's health from treatment-arm outcome
    /// rates and persists the recommendation on the rollout.
    ///
    /// # Errors
    /// Returns [`RolloutError::InvalidTransition`] if the rollout is not
    /// `rolling`, or a repository error on a read/write failure.
    pub async fn evaluate_rollout_health(&self, rollout_id: &RolloutId) -> Result<HealthRecommendation, RolloutError> {
        let mut rollout = self.rollout_repo.get(rollout_id).await?;
        if rollout.status != RolloutStatus::Rolling {
            return Err(RolloutError::InvalidTransition);
        }
        let stage = *rollout
            .current_stage()
            .ok_or_else(|| RolloutError::InvariantViolation("rollout has no current stage".to_owned()))?;
        let started_at = rollout
            .started_at
            .ok_or_else(|| RolloutError::InvariantViolation("rolling rollout has no start time".to_owned()))?;

        let now = self.clock.now();
        let filter = TrainingDatapointFilter {
            site_url: Some(rollout.site_url.clone()),
            since: Some(started_at),
            ..TrainingDatapointFilter::default()
        };
        let distribution = self.datapoint_repo.outcome_distribution(&filter).await?;
        let sample_size = total_count(&distribution);
        let conversion_rate = rate(count_for(&distribution, OutcomeLabel::Converted), sample_size);
        let dismissal_rate = rate(count_for(&distribution, OutcomeLabel::Dismissed), sample_size);

        let hours_in_stage = hours_in_current_stage(&rollout, started_at, now);
        let recommendation = recommend(sample_size, conversion_rate, dismissal_rate, hours_in_stage, &stage);

        rollout.last_health_check = Some(now);
        rollout.last_health_status = Some(recommendation);
        self.rollout_repo.update(rollout).await?;
        Ok(recommendation)
    }

    /// Evaluates and applies the health recommendation for every `rolling`
    /// rollout. A failure on one rollout does not prevent the others from
    /// being checked.
    ///
    /// # Errors
    /// Returns a repository error only if listing rolling rollouts itself
    /// fails; per-rollout failures are reported in the returned vector.
    pub async fn check_all_rollouts_health(&self) -> Result<Vec<(RolloutId, Result<HealthRecommendation, RolloutError>)>, RolloutError> {
        let rolling = self.rollout_repo.list_rolling().await?;
        let mut results = Vec::with_capacity(rolling.len());
        for rollout in rolling {
            let outcome = self.evaluate_and_apply(&rollout.id).await;
            results.push((rollout.id, outcome));
        }
        Ok(results)
    }

    /// Evaluates one rollout's health and immediately applies the
    /// resulting recommendation (promote, rollback, or hold).
    async fn evaluate_and_apply(&self, rollout_id: &RolloutId) -> Result<HealthRecommendation, RolloutError> {
        let recommendation = self.evaluate_rollout_health(rollout_id).await?;
        match recommendation {
            HealthRecommendation::Promote => {
                self.promote(rollout_id).await?;
            }
            HealthRecommendation::Rollback => {
                self.rollback(rollout_id, "automated health check breached rollback thresholds").await?;
            }
            HealthRecommendation::Hold => {}
        }
        Ok(recommendation)
    }
}

/// Sets the `treatment`/`control` variants' weights to reflect
/// `treatment_percent`, leaving any other variant untouched.
fn apply_variant_weights(experiment: &mut Experiment, treatment_percent: u8) {
    let treatment_weight = f64::from(treatment_percent) / 100.0;
    for variant in &mut experiment.variants {
        if variant.name == TREATMENT_VARIANT_NAME {
            variant.weight = treatment_weight;
        } else if variant.name == CONTROL_VARIANT_NAME {
            variant.weight = 1.0 - treatment_weight;
        }
    }
}

/// Sums every outcome bucket's count into the distribution's total sample size.
fn total_count(distribution: &OutcomeDistribution) -> u64 {
    distribution.counts.iter().map(|&(_, count)| count).sum()
}

/// Looks up a single outcome label's count in the distribution, or zero if
/// the label never appeared.
fn count_for(distribution: &OutcomeDistribution, label: OutcomeLabel) -> u64 {
    distribution
        .counts
        .iter()
        .find(|&&(outcome, _)| outcome == label)
        .map_or(0, |&(_, count)| count)
}

/// Computes `count / total`, or `0.0` when `total` is zero rather than dividing by it.
fn rate(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Estimates hours elapsed in the rollout's current stage, assuming every
/// prior stage was held for exactly its configured minimum duration. No
/// repository persists a per-stage entry time, so this is computed rather
/// than read; a stage promoted manually ahead of its minimum hold reads as
/// having been held longer than it actually was.
fn hours_in_current_stage(rollout: &Rollout, started_at: OffsetDateTime, now: OffsetDateTime) -> u64 {
    let prior_hours: u32 = rollout.stages[..rollout.current_stage].iter().map(|stage| stage.duration_hours).sum();
    let stage_entered_at = started_at + Duration::hours(i64::from(prior_hours));
    seconds_between(stage_entered_at, now) / 3600
}

/// Decides whether a rollout stage should promote, hold, or roll back
/// given its observed sample size and rates against its configured
/// [`HealthCriteria`](ava_core::model::rollout::HealthCriteria).
fn recommend(
    sample_size: u64,
    conversion_rate: f64,
    dismissal_rate: f64,
    hours_in_stage: u64,
    stage: &ava_core::model::rollout::RolloutStage,
) -> HealthRecommendation {
    let criteria = stage.health_checks;
    if sample_size < criteria.min_sample_size {
        return HealthRecommendation::Hold;
    }
    if conversion_rate < 0.5 * criteria.min_conversion_rate || dismissal_rate > 1.5 * criteria.max_dismissal_rate {
        return HealthRecommendation::Rollback;
    }
    let all_pass = conversion_rate >= criteria.min_conversion_rate && dismissal_rate <= criteria.max_dismissal_rate;
    if all_pass && hours_in_stage >= u64::from(stage.duration_hours) {
        HealthRecommendation::Promote
    } else {
        HealthRecommendation::Hold
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

    use std::sync::Mutex;

    use async_trait::async_trait;
    use ava_core::clock::FixedClock;
    use ava_core::identifiers::ScoringConfigId;
    use ava_core::identifiers::SiteUrl;
    use ava_core::model::rollout::HealthCriteria;
    use ava_core::model::rollout::RolloutStage;
    use ava_core::model::scoring_config::ScoringConfig;
    use time::macros::datetime;

    use super::*;

    struct FakeRolloutRepo {
        rollouts: Mutex<std::collections::HashMap<RolloutId, Rollout>>,
    }

    impl FakeRolloutRepo {
        fn seeded(rollout: Rollout) -> Self {
            let mut map = std::collections::HashMap::new();
            map.insert(rollout.id.clone(), rollout);
            Self { rollouts: Mutex::new(map) }
        }
    }

    #[async_trait]
    impl RolloutRepo for FakeRolloutRepo {
        async fn create(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
            self.rollouts.lock().expect("lock").insert(rollout.id.clone(), rollout);
            Ok(())
        }

        async fn get(&self, id: &RolloutId) -> Result<Rollout, ControlPlaneRepoError> {
            self.rollouts.lock().expect("lock").get(id).cloned().ok_or(ControlPlaneRepoError::NotFound)
        }

        async fn update(&self, rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
            self.rollouts.lock().expect("lock").insert(rollout.id.clone(), rollout);
            Ok(())
        }

        async fn list_rolling(&self) -> Result<Vec<Rollout>, ControlPlaneRepoError> {
            Ok(self
                .rollouts
                .lock()
                .expect("lock")
                .values()
                .filter(|rollout| rollout.status == RolloutStatus::Rolling)
                .cloned()
                .collect())
        }

        async fn get_active_rollout(&self, site_url: &SiteUrl) -> Result<Option<Rollout>, ControlPlaneRepoError> {
            Ok(self
                .rollouts
                .lock()
                .expect("lock")
                .values()
                .find(|rollout| &rollout.site_url == site_url && rollout.status == RolloutStatus::Rolling)
                .cloned())
        }

        async fn advance_stage(&self, id: &RolloutId, stage_index: usize) -> Result<(), ControlPlaneRepoError> {
            let mut guard = self.rollouts.lock().expect("lock");
            let rollout = guard.get_mut(id).ok_or(ControlPlaneRepoError::NotFound)?;
            rollout.current_stage = stage_index;
            Ok(())
        }
    }

    struct FakeExperimentRepo {
        experiments: Mutex<std::collections::HashMap<ExperimentId, Experiment>>,
    }

    impl FakeExperimentRepo {
        fn new() -> Self {
            Self { experiments: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    #[async_trait]
    impl ExperimentRepo for FakeExperimentRepo {
        async fn create(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
            self.experiments.lock().expect("lock").insert(experiment.id.clone(), experiment);
            Ok(())
        }

        async fn get(&self, id: &ExperimentId) -> Result<Experiment, ControlPlaneRepoError> {
            self.experiments.lock().expect("lock").get(id).cloned().ok_or(ControlPlaneRepoError::NotFound)
        }

        async fn update(&self, experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
            self.experiments.lock().expect("lock").insert(experiment.id.clone(), experiment);
            Ok(())
        }
    }

    struct FakeScoringConfigRepo;

    #[async_trait]
    impl ScoringConfigRepo for FakeScoringConfigRepo {
        async fn list(&self, _site_url: Option<&SiteUrl>) -> Result<Vec<ScoringConfig>, ScoringConfigRepoError> {
            Ok(Vec::new())
        }

        async fn get(&self, _id: &ScoringConfigId) -> Result<ScoringConfig, ScoringConfigRepoError> {
            Ok(ScoringConfig::builtin_default())
        }

        async fn create(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn update(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn activate(&self, _id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn delete(&self, _id: &ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn get_active_config(&self, _site_url: &SiteUrl) -> Result<ScoringConfig, ScoringConfigRepoError> {
            Ok(ScoringConfig::builtin_default())
        }
    }

    struct FakeDatapointRepo {
        distribution: OutcomeDistribution,
    }

    #[async_trait]
    impl TrainingDatapointRepo for FakeDatapointRepo {
        async fn create(&self, _datapoint: ava_core::model::training_datapoint::TrainingDatapoint) -> Result<(), TrainingDatapointRepoError> {
            Ok(())
        }

        async fn list(
            &self,
            _filter: &TrainingDatapointFilter,
        ) -> Result<Vec<ava_core::model::training_datapoint::TrainingDatapoint>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn outcome_distribution(&self, _filter: &TrainingDatapointFilter) -> Result<OutcomeDistribution, TrainingDatapointRepoError> {
            Ok(self.distribution.clone())
        }

        async fn tier_outcome_cross_tab(
            &self,
            _filter: &TrainingDatapointFilter,
        ) -> Result<Vec<ava_core::repo::TierOutcomeCell>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &TrainingDatapointFilter) -> Result<u64, TrainingDatapointRepoError> {
            Ok(total_count(&self.distribution))
        }
    }

    fn sample_rollout() -> Rollout {
        Rollout {
            id: RolloutId::from("r-1"),
            name: "nudge cap widen".to_owned(),
            site_url: SiteUrl::from("https://shop.example.com"),
            change_type: ChangeType::ScoringConfig(ScoringConfigId::from("sc-new")),
            stages: vec![
                RolloutStage {
                    percent: 10,
                    duration_hours: 24,
                    health_checks: HealthCriteria { min_sample_size: 50, min_conversion_rate: 0.1, max_dismissal_rate: 0.4 },
                },
                RolloutStage {
                    percent: 100,
                    duration_hours: 24,
                    health_checks: HealthCriteria { min_sample_size: 50, min_conversion_rate: 0.1, max_dismissal_rate: 0.4 },
                },
            ],
            status: RolloutStatus::Pending,
            current_stage: 0,
            started_at: None,
            experiment_id: None,
            last_health_check: None,
            last_health_status: None,
        }
    }

    fn controller(
        rollout: Rollout,
        distribution: OutcomeDistribution,
        clock: Arc<FixedClock>,
    ) -> (RolloutController, Arc<FakeRolloutRepo>, Arc<FakeExperimentRepo>) {
        let rollout_repo = Arc::new(FakeRolloutRepo::seeded(rollout));
        let experiment_repo = Arc::new(FakeExperimentRepo::new());
        let controller = RolloutController::new(
            rollout_repo.clone(),
            experiment_repo.clone(),
            Arc::new(FakeScoringConfigRepo),
            Arc::new(FakeDatapointRepo { distribution }),
            clock,
        );
        (controller, rollout_repo, experiment_repo)
    }

    #[tokio::test]
    async fn start_creates_linked_experiment_at_first_stage_split() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-01 00:00:00 UTC)));
        let (controller, _repo, experiment_repo) = controller(sample_rollout(), OutcomeDistribution::default(), clock);

        let rollout = controller.start(&RolloutId::from("r-1")).await.expect("start");
        assert_eq!(rollout.status, RolloutStatus::Rolling);
        let experiment_id = rollout.experiment_id.expect("experiment linked");
        let experiment = experiment_repo.get(&experiment_id).await.expect("get");
        let treatment = experiment.variants.iter().find(|v| v.name == "treatment").expect("treatment arm");
        assert!((treatment.weight - 0.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn start_rejects_a_second_rolling_rollout_for_the_same_site() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-01 00:00:00 UTC)));
        let mut already_rolling = sample_rollout();
        already_rolling.id = RolloutId::from("r-0");
        already_rolling.status = RolloutStatus::Rolling;
        already_rolling.started_at = Some(datetime!(2025-12-31 00:00:00 UTC));

        let rollout_repo = Arc::new(FakeRolloutRepo::seeded(already_rolling));
        rollout_repo.create(sample_rollout()).await.expect("seed second rollout");
        let controller = RolloutController::new(
            rollout_repo,
            Arc::new(FakeExperimentRepo::new()),
            Arc::new(FakeScoringConfigRepo),
            Arc::new(FakeDatapointRepo { distribution: OutcomeDistribution::default() }),
            clock,
        );

        let result = controller.start(&RolloutId::from("r-1")).await;
        assert!(matches!(result, Err(RolloutError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn promote_at_final_stage_activates_config_and_ends_experiment() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-01 00:00:00 UTC)));
        let mut rollout = sample_rollout();
        rollout.status = RolloutStatus::Rolling;
        rollout.current_stage = 1;
        rollout.started_at = Some(datetime!(2026-01-01 00:00:00 UTC));
        rollout.experiment_id = Some(ExperimentId::from("exp-1"));

        let (controller, _rollout_repo, experiment_repo) = controller(rollout, OutcomeDistribution::default(), clock);
        experiment_repo
            .create(Experiment {
                id: ExperimentId::from("exp-1"),
                name: "widen rollout".to_owned(),
                site_url: Some(SiteUrl::from("https://shop.example.com")),
                status: ExperimentStatus::Running,
                traffic_percent: 100,
                variants: vec![],
                primary_metric: "conversion_rate".to_owned(),
            })
            .await
            .expect("seed experiment");

        let result = controller.promote(&RolloutId::from("r-1")).await.expect("promote");
        assert_eq!(result.status, RolloutStatus::Completed);
        let experiment = experiment_repo.get(&ExperimentId::from("exp-1")).await.expect("get");
        assert_eq!(experiment.status, ExperimentStatus::Ended);
    }

    #[tokio::test]
    async fn evaluate_rollout_health_holds_below_minimum_sample() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-02 00:00:00 UTC)));
        let mut rollout = sample_rollout();
        rollout.status = RolloutStatus::Rolling;
        rollout.started_at = Some(datetime!(2026-01-01 00:00:00 UTC));
        let distribution = OutcomeDistribution { counts: vec![(OutcomeLabel::Converted, 2), (OutcomeLabel::Dismissed, 1)] };

        let (controller, _rollout_repo, _experiment_repo) = controller(rollout, distribution, clock);
        let recommendation = controller.evaluate_rollout_health(&RolloutId::from("r-1")).await.expect("evaluate");
        assert_eq!(recommendation, HealthRecommendation::Hold);
    }

    #[tokio::test]
    async fn evaluate_rollout_health_recommends_rollback_on_breached_thresholds() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-02 00:00:00 UTC)));
        let mut rollout = sample_rollout();
        rollout.status = RolloutStatus::Rolling;
        rollout.started_at = Some(datetime!(2026-01-01 00:00:00 UTC));
        // 100 sample, 2 converted (0.02 << 0.5*0.1), well past the sample floor.
        let distribution = OutcomeDistribution {
            counts: vec![(OutcomeLabel::Converted, 2), (OutcomeLabel::Dismissed, 60), (OutcomeLabel::Ignored, 38)],
        };

        let (controller, _rollout_repo, _experiment_repo) = controller(rollout, distribution, clock);
        let recommendation = controller.evaluate_rollout_health(&RolloutId::from("r-1")).await.expect("evaluate");
        assert_eq!(recommendation, HealthRecommendation::Rollback);
    }

    #[tokio::test]
    async fn evaluate_rollout_health_recommends_promote_once_stage_duration_elapses() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-03 01:00:00 UTC)));
        let mut rollout = sample_rollout();
        rollout.status = RolloutStatus::Rolling;
        rollout.started_at = Some(datetime!(2026-01-01 00:00:00 UTC));
        let distribution = OutcomeDistribution {
            counts: vec![(OutcomeLabel::Converted, 20), (OutcomeLabel::Dismissed, 10), (OutcomeLabel::Ignored, 70)],
        };

        let (controller, _rollout_repo, _experiment_repo) = controller(rollout, distribution, clock);
        let recommendation = controller.evaluate_rollout_health(&RolloutId::from("r-1")).await.expect("evaluate");
        assert_eq!(recommendation, HealthRecommendation::Promote);
    }
}
