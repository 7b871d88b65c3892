// crates/ava-core/src/model/job_run.rs
// ============================================================================
// Module: Job Run
// Description: Lifecycle record for one invocation of a scheduled or
//              manually triggered job.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::JobRunId;

/// Status of a [`JobRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    /// Started, not yet finished.
    Running,
    /// Finished without error.
    Completed,
    /// Finished with an unrecovered error.
    Failed,
}

/// Who or what triggered a [`JobRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    /// A periodic timer (nightly, hourly, canary).
    Scheduler,
    /// An operator-initiated manual trigger.
    Api,
}

/// A lifecycle record for one run of a named job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    /// Unique identifier.
    pub id: JobRunId,
    /// Name of the job, e.g. `"nightly_batch"`, `"hourly_snapshot"`,
    /// `"canary_check"`.
    pub job_name: String,
    /// Current status.
    pub status: JobRunStatus,
    /// Instant the run started.
    pub started_at: OffsetDateTime,
    /// Instant the run completed, if it has.
    pub completed_at: Option<OffsetDateTime>,
    /// Wall-clock duration, in milliseconds, once completed.
    pub duration_ms: Option<u64>,
    /// Human-readable summary of what the run did, populated on completion.
    pub summary: Option<String>,
    /// Error detail, populated only on `Failed`.
    pub error: Option<String>,
    /// What triggered this run.
    pub triggered_by: TriggeredBy,
}

impl JobRun {
    /// Starts a new run record for `job_name`, triggered by `triggered_by`,
    /// at `started_at`.
    #[must_use]
    pub fn start(
        id: JobRunId,
        job_name: impl Into<String>,
        triggered_by: TriggeredBy,
        started_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            job_name: job_name.into(),
            status: JobRunStatus::Running,
            started_at,
            completed_at: None,
            duration_ms: None,
            summary: None,
            error: None,
            triggered_by,
        }
    }

    /// Marks the run completed successfully at `completed_at` with
    /// `summary`.
    pub fn complete(&mut self, completed_at: OffsetDateTime, summary: impl Into<String>) {
        self.status = JobRunStatus::Completed;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(crate::clock::seconds_between(self.started_at, completed_at) * 1000);
        self.summary = Some(summary.into());
    }

    /// Marks the run failed at `completed_at` with `error`.
    pub fn fail(&mut self, completed_at: OffsetDateTime, error: impl Into<String>) {
        self.status = JobRunStatus::Failed;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(crate::clock::seconds_between(self.started_at, completed_at) * 1000);
        self.error = Some(error.into());
    }
}
