// crates/ava-control/src/job_runner.rs
// ============================================================================
// Module: Job Runner
// Description: The nightly batch, hourly drift snapshot, and canary rollout
//              check timers, each independently scheduled and each
//              recording a JobRun.
// ============================================================================

//! Three independent timers drive the control plane's background work:
//! a nightly batch that self-reschedules against absolute wall clock rather
//! than `now + 24h` (so a paused process does not drift its run time), an
//! hourly drift snapshot, and a canary rollout-health check every fifteen
//! minutes. Every run, scheduled or manually triggered, is recorded as a
//! [`JobRun`] and reported through [`Telemetry::job_run_completed`]. The
//! nightly batch's six subtasks are failure-isolated: one subtask's error
//! is recorded in the run's summary but never prevents the others from
//! running.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use ava_core::clock::Clock;
use ava_core::clock::seconds_between;
use ava_core::identifiers::JobRunId;
use ava_core::model::job_run::JobRun;
use ava_core::model::job_run::TriggeredBy;
use ava_core::model::scoring_config::ScoringConfig;
use ava_core::quality::QualityThresholds;
use ava_core::repo::DriftAlertRepo;
use ava_core::repo::DriftSnapshotRepo;
use ava_core::repo::JobRunRepo;
use ava_core::repo::TrainingDatapointFilter;
use ava_core::repo::TrainingDatapointRepo;
use ava_core::telemetry::JobRunCompleted;
use ava_core::telemetry::Telemetry;
use time::Duration;
use time::OffsetDateTime;
use time::Time;
use tokio::sync::watch;
use tokio::time::interval;

use crate::drift::DriftDetector;
use crate::eval_harness;
use crate::ids::IdGenerator;
use crate::rollout::RolloutController;

/// Hour of day (UTC) the nightly batch targets.
const NIGHTLY_HOUR_UTC: u8 = 2;
/// Interval between hourly drift snapshots.
const HOURLY_PERIOD: StdDuration = StdDuration::from_secs(3600);
/// Interval between canary rollout-health checks.
const CANARY_PERIOD: StdDuration = StdDuration::from_secs(15 * 60);
/// Snapshots older than this are pruned by the nightly cleanup subtask.
const SNAPSHOT_RETENTION_DAYS: i64 = 30;
/// Alerts older than this are pruned by the nightly cleanup subtask.
const ALERT_RETENTION_DAYS: i64 = 30;
/// Job runs older than this are pruned by the nightly cleanup subtask.
const JOB_RUN_RETENTION_DAYS: i64 = 90;

/// Name recorded on a nightly batch's [`JobRun`].
const NIGHTLY_JOB_NAME: &str = "nightly_batch";
/// Name recorded on an hourly snapshot's [`JobRun`].
const HOURLY_JOB_NAME: &str = "hourly_snapshot";
/// Name recorded on a canary check's [`JobRun`].
const CANARY_JOB_NAME: &str = "canary_check";

/// The outcome of one nightly-batch subtask.
struct SubtaskOutcome {
    /// Stable subtask name, e.g. `"drift_check"`.
    name: &'static str,
    /// Human-readable result, included in the run's summary either way.
    detail: String,
    /// Whether the subtask completed without error.
    ok: bool,
}

/// Drives the three scheduled job families and records their runs.
pub struct JobRunner {
    /// Job-run lifecycle store.
    job_run_repo: Arc<dyn JobRunRepo>,
    /// Outcome source for the nightly quality-stats subtask.
    datapoint_repo: Arc<dyn TrainingDatapointRepo>,
    /// Snapshot store, pruned by the nightly cleanup subtask.
    snapshot_repo: Arc<dyn DriftSnapshotRepo>,
    /// Alert store, pruned by the nightly cleanup subtask.
    alert_repo: Arc<dyn DriftAlertRepo>,
    /// Drift detector driving the nightly and hourly drift checks.
    drift_detector: Arc<DriftDetector>,
    /// Rollout controller driving the canary health check.
    rollout_controller: Arc<RolloutController>,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
    /// Observability sink for completed runs.
    telemetry: Arc<dyn Telemetry>,
    /// Thresholds the quality-stats subtask grades datapoints against.
    quality_thresholds: QualityThresholds,
    /// Mints [`JobRunId`]s.
    job_run_ids: IdGenerator,
}

impl JobRunner {
    /// Builds a runner from its collaborating repositories and detectors.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "Composition root wiring every collaborator explicitly, matching the evaluator's constructor shape.")]
    pub fn new(
        job_run_repo: Arc<dyn JobRunRepo>,
        datapoint_repo: Arc<dyn TrainingDatapointRepo>,
        snapshot_repo: Arc<dyn DriftSnapshotRepo>,
        alert_repo: Arc<dyn DriftAlertRepo>,
        drift_detector: Arc<DriftDetector>,
        rollout_controller: Arc<RolloutController>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            job_run_repo,
            datapoint_repo,
            snapshot_repo,
            alert_repo,
            drift_detector,
            rollout_controller,
            clock,
            telemetry,
            quality_thresholds: QualityThresholds::defaults(),
            job_run_ids: IdGenerator::new("job"),
        }
    }

    /// Runs the three timers until `shutdown` is signalled. The nightly
    /// timer re-sleeps against the next absolute occurrence of
    /// [`NIGHTLY_HOUR_UTC`] after every run rather than a fixed `+24h`
    /// offset, so a delayed run does not push every later run later too.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut hourly = interval(HOURLY_PERIOD);
        let mut canary = interval(CANARY_PERIOD);
        loop {
            let nightly_sleep = tokio::time::sleep(StdDuration::from_secs(self.seconds_until_next_nightly()));
            tokio::select! {
                () = nightly_sleep => {
                    let _ = self.run_nightly_batch(TriggeredBy::Scheduler).await;
                }
                _ = hourly.tick() => {
                    let _ = self.run_hourly_snapshot(TriggeredBy::Scheduler).await;
                }
                _ = canary.tick() => {
                    let _ = self.run_canary_check(TriggeredBy::Scheduler).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    fn seconds_until_next_nightly(&self) -> u64 {
        let now = self.clock.now();
        let midnight_today = now.replace_time(Time::MIDNIGHT);
        let target_today = midnight_today + Duration::hours(i64::from(NIGHTLY_HOUR_UTC));
        let next_run = if target_today > now { target_today } else { target_today + Duration::days(1) };
        seconds_between(now, next_run).max(1)
    }

    /// Runs every nightly subtask, persists the run, and reports it.
    ///
    /// # Errors
    /// Returns a job-run store error only if persisting the run record
    /// itself fails; individual subtask failures are recorded in the run's
    /// summary instead of propagated.
    pub async fn run_nightly_batch(&self, triggered_by: TriggeredBy) -> Result<JobRun, String> {
        let started_at = self.clock.now();
        let mut run = JobRun::start(JobRunId::from(self.job_run_ids.issue()), NIGHTLY_JOB_NAME, triggered_by, started_at);
        self.job_run_repo.create(run.clone()).await.map_err(|error| error.to_string())?;

        let outcomes = vec![
            self.quality_stats_subtask(started_at).await,
            self.eval_harness_subtask(),
            self.drift_check_subtask().await,
            self.rollout_health_subtask().await,
            self.daily_summary_subtask(),
            self.cleanup_subtask(started_at).await,
        ];

        let all_ok = outcomes.iter().all(|outcome| outcome.ok);
        let summary = outcomes.iter().map(|outcome| format!("{}: {}", outcome.name, outcome.detail)).collect::<Vec<_>>().join("; ");

        let completed_at = self.clock.now();
        if all_ok {
            run.complete(completed_at, summary);
            self.job_run_repo.complete(run.clone()).await.map_err(|error| error.to_string())?;
        } else {
            run.fail(completed_at, summary);
            self.job_run_repo.fail(run.clone()).await.map_err(|error| error.to_string())?;
        }
        self.report(&run);
        Ok(run)
    }

    /// Computes and persists an hourly drift snapshot.
    ///
    /// # Errors
    /// Returns a job-run store error if persisting the run record fails.
    pub async fn run_hourly_snapshot(&self, triggered_by: TriggeredBy) -> Result<JobRun, String> {
        let started_at = self.clock.now();
        let mut run = JobRun::start(JobRunId::from(self.job_run_ids.issue()), HOURLY_JOB_NAME, triggered_by, started_at);
        self.job_run_repo.create(run.clone()).await.map_err(|error| error.to_string())?;

        let result = self.drift_detector.compute_window_snapshot(ava_core::model::drift::WindowType::OneHour, None).await;
        let completed_at = self.clock.now();
        match result {
            Ok(snapshot) => {
                run.complete(completed_at, format!("sample_size={}", snapshot.comparison_sample_size));
                self.job_run_repo.complete(run.clone()).await.map_err(|error| error.to_string())?;
            }
            Err(error) => {
                run.fail(completed_at, error.to_string());
                self.job_run_repo.fail(run.clone()).await.map_err(|error| error.to_string())?;
            }
        }
        self.report(&run);
        Ok(run)
    }

    /// Evaluates every `rolling` rollout's health as a lightweight canary.
    ///
    /// # Errors
    /// Returns a job-run store error if persisting the run record fails.
    pub async fn run_canary_check(&self, triggered_by: TriggeredBy) -> Result<JobRun, String> {
        let started_at = self.clock.now();
        let mut run = JobRun::start(JobRunId::from(self.job_run_ids.issue()), CANARY_JOB_NAME, triggered_by, started_at);
        self.job_run_repo.create(run.clone()).await.map_err(|error| error.to_string())?;

        let result = self.rollout_controller.check_all_rollouts_health().await;
        let completed_at = self.clock.now();
        match result {
            Ok(results) => {
                run.complete(completed_at, format!("checked {} rolling rollout(s)", results.len()));
                self.job_run_repo.complete(run.clone()).await.map_err(|error| error.to_string())?;
            }
            Err(error) => {
                run.fail(completed_at, error.to_string());
                self.job_run_repo.fail(run.clone()).await.map_err(|error| error.to_string())?;
            }
        }
        self.report(&run);
        Ok(run)
    }

    async fn quality_stats_subtask(&self, since: OffsetDateTime) -> SubtaskOutcome {
        let filter = TrainingDatapointFilter { since: Some(since - Duration::hours(24)), ..TrainingDatapointFilter::default() };
        match self.datapoint_repo.list(&filter).await {
            Ok(datapoints) => {
                let mut high = 0u32;
                let mut medium = 0u32;
                let mut low = 0u32;
                let mut rejected = 0u32;
                for datapoint in &datapoints {
                    match ava_core::quality::assess(datapoint, &self.quality_thresholds).grade {
                        ava_core::quality::Grade::High => high += 1,
                        ava_core::quality::Grade::Medium => medium += 1,
                        ava_core::quality::Grade::Low => low += 1,
                        ava_core::quality::Grade::Rejected => rejected += 1,
                    }
                }
                SubtaskOutcome {
                    name: "quality_stats",
                    detail: format!("n={} high={high} medium={medium} low={low} rejected={rejected}", datapoints.len()),
                    ok: true,
                }
            }
            Err(error) => SubtaskOutcome { name: "quality_stats", detail: error.to_string(), ok: false },
        }
    }

    fn eval_harness_subtask(&self) -> SubtaskOutcome {
        let regressions = eval_harness::run_regression_check(&ScoringConfig::builtin_default());
        if regressions.is_empty() {
            SubtaskOutcome { name: "eval_harness", detail: "all golden cases passed".to_owned(), ok: true }
        } else {
            let names = regressions.iter().map(|regression| regression.case_name).collect::<Vec<_>>().join(", ");
            SubtaskOutcome { name: "eval_harness", detail: format!("regressed: {names}"), ok: false }
        }
    }

    async fn drift_check_subtask(&self) -> SubtaskOutcome {
        match self.drift_detector.run_drift_check().await {
            Ok(alerts) => SubtaskOutcome { name: "drift_check", detail: format!("{} alert(s) raised", alerts.len()), ok: true },
            Err(error) => SubtaskOutcome { name: "drift_check", detail: error.to_string(), ok: false },
        }
    }

    async fn rollout_health_subtask(&self) -> SubtaskOutcome {
        match self.rollout_controller.check_all_rollouts_health().await {
            Ok(results) => {
                let failures = results.iter().filter(|(_, outcome)| outcome.is_err()).count();
                SubtaskOutcome { name: "rollout_health", detail: format!("{} rollout(s) checked, {failures} failed", results.len()), ok: failures == 0 }
            }
            Err(error) => SubtaskOutcome { name: "rollout_health", detail: error.to_string(), ok: false },
        }
    }

    fn daily_summary_subtask(&self) -> SubtaskOutcome {
        SubtaskOutcome { name: "daily_summary", detail: "see preceding subtask results".to_owned(), ok: true }
    }

    async fn cleanup_subtask(&self, now: OffsetDateTime) -> SubtaskOutcome {
        let snapshot_cutoff = now - Duration::days(SNAPSHOT_RETENTION_DAYS);
        let alert_cutoff = now - Duration::days(ALERT_RETENTION_DAYS);
        let job_run_cutoff = now - Duration::days(JOB_RUN_RETENTION_DAYS);

        let snapshots = self.snapshot_repo.prune_older_than(snapshot_cutoff).await;
        let alerts = self.alert_repo.prune_older_than(alert_cutoff).await;
        let job_runs = self.job_run_repo.prune_older_than(job_run_cutoff).await;

        match (snapshots, alerts, job_runs) {
            (Ok(snapshots), Ok(alerts), Ok(job_runs)) => {
                SubtaskOutcome { name: "cleanup", detail: format!("pruned snapshots={snapshots} alerts={alerts} job_runs={job_runs}"), ok: true }
            }
            (snapshots, alerts, job_runs) => {
                let detail = format!(
                    "snapshots={} alerts={} job_runs={}",
                    snapshots.map_or_else(|error| error.to_string(), |count| count.to_string()),
                    alerts.map_or_else(|error| error.to_string(), |count| count.to_string()),
                    job_runs.map_or_else(|error| error.to_string(), |count| count.to_string()),
                );
                SubtaskOutcome { name: "cleanup", detail, ok: false }
            }
        }
    }

    fn report(&self, run: &JobRun) {
        self.telemetry.job_run_completed(JobRunCompleted {
            job_run_id: run.id.clone(),
            job_name: static_job_name(&run.job_name),
            succeeded: run.status == ava_core::model::job_run::JobRunStatus::Completed,
            duration_ms: run.duration_ms.unwrap_or(0),
        });
    }
}

/// Maps a run's job name back to the `'static` constant it was created
/// from, for the telemetry event's `&'static str` field.
fn static_job_name(job_name: &str) -> &'static str {
    match job_name {
        NIGHTLY_JOB_NAME => NIGHTLY_JOB_NAME,
        HOURLY_JOB_NAME => HOURLY_JOB_NAME,
        CANARY_JOB_NAME => CANARY_JOB_NAME,
        _ => "unknown_job",
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
    use ava_core::identifiers::RolloutId;
    use ava_core::identifiers::SiteUrl;
    use ava_core::model::drift::DriftAlert;
    use ava_core::model::drift::DriftAlertType;
    use ava_core::model::drift::DriftSnapshot;
    use ava_core::model::drift::WindowType;
    use ava_core::model::experiment::Experiment;
    use ava_core::model::rollout::Rollout;
    use ava_core::model::scoring_config::ScoringConfig;
    use ava_core::model::training_datapoint::TrainingDatapoint;
    use ava_core::repo::ControlPlaneRepoError;
    use ava_core::repo::DriftRepoError;
    use ava_core::repo::ExperimentRepo;
    use ava_core::repo::JobRunRepoError;
    use ava_core::repo::OutcomeDistribution;
    use ava_core::repo::RolloutRepo;
    use ava_core::repo::ScoringConfigRepo;
    use ava_core::repo::ScoringConfigRepoError;
    use ava_core::repo::ShadowComparisonFilter;
    use ava_core::repo::ShadowComparisonRepo;
    use ava_core::repo::ShadowComparisonRepoError;
    use ava_core::repo::ShadowComparisonStats;
    use ava_core::repo::TierOutcomeCell;
    use ava_core::repo::TrainingDatapointRepoError;
    use ava_core::telemetry::NoopTelemetry;
    use time::macros::datetime;

    use super::*;
    use crate::drift::DriftThresholds;

    struct EmptyShadowRepo;

    #[async_trait]
    impl ShadowComparisonRepo for EmptyShadowRepo {
        async fn create(&self, _comparison: ava_core::model::shadow::ShadowComparison) -> Result<(), ShadowComparisonRepoError> {
            Ok(())
        }

        async fn list(&self, _filter: &ShadowComparisonFilter) -> Result<Vec<ava_core::model::shadow::ShadowComparison>, ShadowComparisonRepoError> {
            Ok(Vec::new())
        }

        async fn stats(&self, _site_url: Option<&SiteUrl>, _since: OffsetDateTime) -> Result<ShadowComparisonStats, ShadowComparisonRepoError> {
            Ok(ShadowComparisonStats::default())
        }

        async fn top_divergences(&self, _since: OffsetDateTime, _limit: usize) -> Result<Vec<ava_core::model::shadow::ShadowComparison>, ShadowComparisonRepoError> {
            Ok(Vec::new())
        }
    }

    struct EmptyDatapointRepo;

    #[async_trait]
    impl TrainingDatapointRepo for EmptyDatapointRepo {
        async fn create(&self, _datapoint: TrainingDatapoint) -> Result<(), TrainingDatapointRepoError> {
            Ok(())
        }

        async fn list(&self, _filter: &TrainingDatapointFilter) -> Result<Vec<TrainingDatapoint>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn outcome_distribution(&self, _filter: &TrainingDatapointFilter) -> Result<OutcomeDistribution, TrainingDatapointRepoError> {
            Ok(OutcomeDistribution::default())
        }

        async fn tier_outcome_cross_tab(&self, _filter: &TrainingDatapointFilter) -> Result<Vec<TierOutcomeCell>, TrainingDatapointRepoError> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &TrainingDatapointFilter) -> Result<u64, TrainingDatapointRepoError> {
            Ok(0)
        }
    }

    struct EmptySnapshotRepo {
        pruned: Mutex<u64>,
    }

    #[async_trait]
    impl DriftSnapshotRepo for EmptySnapshotRepo {
        async fn create(&self, _snapshot: DriftSnapshot) -> Result<(), DriftRepoError> {
            Ok(())
        }

        async fn list(&self, _window_type: WindowType, _site_url: Option<&SiteUrl>) -> Result<Vec<DriftSnapshot>, DriftRepoError> {
            Ok(Vec::new())
        }

        async fn prune_older_than(&self, _older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
            Ok(*self.pruned.lock().expect("lock"))
        }
    }

    struct EmptyAlertRepo;

    #[async_trait]
    impl DriftAlertRepo for EmptyAlertRepo {
        async fn create(&self, _alert: DriftAlert) -> Result<(), DriftRepoError> {
            Ok(())
        }

        async fn list(&self, _unacknowledged_only: bool) -> Result<Vec<DriftAlert>, DriftRepoError> {
            Ok(Vec::new())
        }

        async fn find_unacknowledged(&self, _alert_type: DriftAlertType, _site_url: Option<&SiteUrl>) -> Result<Option<DriftAlert>, DriftRepoError> {
            Ok(None)
        }

        async fn acknowledge(&self, _id: &ava_core::identifiers::DriftAlertId, _at: OffsetDateTime) -> Result<(), DriftRepoError> {
            Ok(())
        }

        async fn prune_older_than(&self, _older_than: OffsetDateTime) -> Result<u64, DriftRepoError> {
            Ok(0)
        }
    }

    struct EmptyRolloutRepo;

    #[async_trait]
    impl RolloutRepo for EmptyRolloutRepo {
        async fn create(&self, _rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
            Ok(())
        }

        async fn get(&self, _id: &RolloutId) -> Result<Rollout, ControlPlaneRepoError> {
            Err(ControlPlaneRepoError::NotFound)
        }

        async fn update(&self, _rollout: Rollout) -> Result<(), ControlPlaneRepoError> {
            Ok(())
        }

        async fn list_rolling(&self) -> Result<Vec<Rollout>, ControlPlaneRepoError> {
            Ok(Vec::new())
        }

        async fn get_active_rollout(&self, _site_url: &SiteUrl) -> Result<Option<Rollout>, ControlPlaneRepoError> {
            Ok(None)
        }

        async fn advance_stage(&self, _id: &RolloutId, _stage_index: usize) -> Result<(), ControlPlaneRepoError> {
            Ok(())
        }
    }

    struct EmptyExperimentRepo;

    #[async_trait]
    impl ExperimentRepo for EmptyExperimentRepo {
        async fn create(&self, _experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
            Ok(())
        }

        async fn get(&self, _id: &ava_core::identifiers::ExperimentId) -> Result<Experiment, ControlPlaneRepoError> {
            Err(ControlPlaneRepoError::NotFound)
        }

        async fn update(&self, _experiment: Experiment) -> Result<(), ControlPlaneRepoError> {
            Ok(())
        }
    }

    struct EmptyScoringConfigRepo;

    #[async_trait]
    impl ScoringConfigRepo for EmptyScoringConfigRepo {
        async fn list(&self, _site_url: Option<&SiteUrl>) -> Result<Vec<ScoringConfig>, ScoringConfigRepoError> {
            Ok(Vec::new())
        }

        async fn get(&self, _id: &ava_core::identifiers::ScoringConfigId) -> Result<ScoringConfig, ScoringConfigRepoError> {
            Ok(ScoringConfig::builtin_default())
        }

        async fn create(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn update(&self, _config: ScoringConfig) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn activate(&self, _id: &ava_core::identifiers::ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn delete(&self, _id: &ava_core::identifiers::ScoringConfigId) -> Result<(), ScoringConfigRepoError> {
            Ok(())
        }

        async fn get_active_config(&self, _site_url: &SiteUrl) -> Result<ScoringConfig, ScoringConfigRepoError> {
            Ok(ScoringConfig::builtin_default())
        }
    }

    struct EmptyJobRunRepo {
        runs: Mutex<Vec<JobRun>>,
    }

    #[async_trait]
    impl JobRunRepo for EmptyJobRunRepo {
        async fn create(&self, run: JobRun) -> Result<(), JobRunRepoError> {
            self.runs.lock().expect("lock").push(run);
            Ok(())
        }

        async fn complete(&self, run: JobRun) -> Result<(), JobRunRepoError> {
            self.runs.lock().expect("lock").push(run);
            Ok(())
        }

        async fn fail(&self, run: JobRun) -> Result<(), JobRunRepoError> {
            self.runs.lock().expect("lock").push(run);
            Ok(())
        }

        async fn get_last_run(&self, job_name: &str) -> Result<Option<JobRun>, JobRunRepoError> {
            Ok(self.runs.lock().expect("lock").iter().rev().find(|run| run.job_name == job_name).cloned())
        }

        async fn prune_older_than(&self, _older_than: OffsetDateTime) -> Result<u64, JobRunRepoError> {
            Ok(0)
        }
    }

    fn runner(clock: Arc<FixedClock>) -> JobRunner {
        let drift_detector = Arc::new(DriftDetector::new(
            Arc::new(EmptyShadowRepo),
            Arc::new(EmptyDatapointRepo),
            Arc::new(EmptySnapshotRepo { pruned: Mutex::new(0) }),
            Arc::new(EmptyAlertRepo),
            clock.clone(),
            Arc::new(NoopTelemetry),
            DriftThresholds::default(),
        ));
        let rollout_controller =
            Arc::new(RolloutController::new(Arc::new(EmptyRolloutRepo), Arc::new(EmptyExperimentRepo), Arc::new(EmptyScoringConfigRepo), Arc::new(EmptyDatapointRepo), clock.clone()));
        JobRunner::new(
            Arc::new(EmptyJobRunRepo { runs: Mutex::new(Vec::new()) }),
            Arc::new(EmptyDatapointRepo),
            Arc::new(EmptySnapshotRepo { pruned: Mutex::new(0) }),
            Arc::new(EmptyAlertRepo),
            drift_detector,
            rollout_controller,
            clock,
            Arc::new(NoopTelemetry),
        )
    }

    #[tokio::test]
    async fn nightly_batch_completes_when_every_subtask_succeeds() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 02:30:00 UTC)));
        let job_runner = runner(clock);
        let run = job_runner.run_nightly_batch(TriggeredBy::Api).await.expect("nightly batch");
        assert_eq!(run.status, ava_core::model::job_run::JobRunStatus::Completed);
        assert!(run.summary.as_deref().unwrap_or_default().contains("eval_harness"));
    }

    #[tokio::test]
    async fn hourly_snapshot_persists_a_completed_run() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 02:30:00 UTC)));
        let job_runner = runner(clock);
        let run = job_runner.run_hourly_snapshot(TriggeredBy::Scheduler).await.expect("hourly snapshot");
        assert_eq!(run.status, ava_core::model::job_run::JobRunStatus::Completed);
    }

    #[test]
    fn seconds_until_next_nightly_targets_the_configured_hour() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 01:00:00 UTC)));
        let job_runner = runner(clock);
        assert_eq!(job_runner.seconds_until_next_nightly(), 3600);
    }

    #[test]
    fn seconds_until_next_nightly_rolls_to_tomorrow_once_past_the_hour() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-01-10 03:00:00 UTC)));
        let job_runner = runner(clock);
        assert_eq!(job_runner.seconds_until_next_nightly(), 23 * 3600);
    }
}
