// crates/ava-core/src/telemetry.rs
// ============================================================================
// Module: AVA Telemetry
// Description: Structured observability events, delivered through a trait.
// Purpose: Satisfy every "log" instruction in the system design without a
//          logging-crate dependency, the same way the teacher workspace does.
// Dependencies: none (std only)
// ============================================================================

//! ## Overview
//! The workspace carries no logging crate. Observability is expressed as
//! typed event structs delivered through [`Telemetry`], a `Send + Sync`
//! trait with one method per structured event family. [`NoopTelemetry`] is
//! the production default when no sink is wired up; [`RecordingTelemetry`]
//! is used by tests to assert on emitted events.

use std::sync::Mutex;

use crate::identifiers::DriftAlertId;
use crate::identifiers::EvaluationId;
use crate::identifiers::JobRunId;
use crate::identifiers::SessionId;
use crate::identifiers::SiteUrl;

/// A completed MSWIM evaluation, reported regardless of decision.
#[derive(Debug, Clone)]
pub struct EvaluationCompleted {
    /// Session the evaluation was run for.
    pub session_id: SessionId,
    /// Identifier assigned to the persisted evaluation record.
    pub evaluation_id: EvaluationId,
    /// Composite score produced by the evaluation.
    pub composite_score: f64,
    /// Resolved tier name, e.g. `"NUDGE"`.
    pub tier: &'static str,
    /// Whether the evaluation resulted in `fire` or `suppress`.
    pub decision: &'static str,
}

/// A gate rule overrode the tier-derived decision.
#[derive(Debug, Clone)]
pub struct GateOverridden {
    /// Session the override applied to.
    pub session_id: SessionId,
    /// Identifier of the rule that matched, e.g. `"DISMISS_CAP"`.
    pub rule_id: &'static str,
}

/// A persistence write exhausted its bounded retry budget and was dropped.
#[derive(Debug, Clone)]
pub struct PersistenceRetryExhausted {
    /// Name of the repository operation that failed, e.g. `"EvaluationRepo::create"`.
    pub operation: &'static str,
    /// Session the dropped write belonged to, when applicable.
    pub session_id: Option<SessionId>,
}

/// The generative-model call failed or timed out and the evaluator fell
/// back to synthesized hints.
#[derive(Debug, Clone)]
pub struct GenerativeModelFallback {
    /// Session the fallback applied to.
    pub session_id: SessionId,
    /// Human-readable reason, e.g. `"timeout"` or `"rpc error"`.
    pub reason: &'static str,
}

/// A scheduled or manually triggered job run completed.
#[derive(Debug, Clone)]
pub struct JobRunCompleted {
    /// Identifier of the completed job run record.
    pub job_run_id: JobRunId,
    /// Name of the job, e.g. `"nightly_batch"`.
    pub job_name: &'static str,
    /// Whether every subtask succeeded.
    pub succeeded: bool,
    /// Wall-clock duration of the run, in milliseconds.
    pub duration_ms: u64,
}

/// A drift alert was raised (and was not a duplicate of an unacknowledged
/// alert of the same type and site).
#[derive(Debug, Clone)]
pub struct DriftAlertRaised {
    /// Identifier of the persisted alert.
    pub alert_id: DriftAlertId,
    /// Site the alert concerns, if site-scoped.
    pub site_url: Option<SiteUrl>,
    /// Alert type, e.g. `"CONVERSION_DROP"`.
    pub alert_type: &'static str,
    /// Whether the alert is `"critical"` or `"warning"`.
    pub severity: &'static str,
}

/// A `Send + Sync` sink for the structured events the evaluation pipeline
/// and control plane emit in place of ad-hoc log lines.
///
/// Every method has a default no-op body so implementors only override the
/// event families they care about.
pub trait Telemetry: Send + Sync {
    /// Records that an evaluation completed.
    fn evaluation_completed(&self, _event: EvaluationCompleted) {}

    /// Records that a gate rule overrode the tier-derived decision.
    fn gate_overridden(&self, _event: GateOverridden) {}

    /// Records that a persistence write was dropped after exhausting retries.
    fn persistence_retry_exhausted(&self, _event: PersistenceRetryExhausted) {}

    /// Records that the generative-model path fell back to synthesized hints.
    fn generative_model_fallback(&self, _event: GenerativeModelFallback) {}

    /// Records that a scheduled job run completed.
    fn job_run_completed(&self, _event: JobRunCompleted) {}

    /// Records that a drift alert was raised.
    fn drift_alert_raised(&self, _event: DriftAlertRaised) {}
}

/// The production default: discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// One captured telemetry event, used by [`RecordingTelemetry`] to make
/// assertions order-agnostic across the different event families.
#[derive(Debug, Clone)]
pub enum RecordedEvent {
    /// See [`EvaluationCompleted`].
    EvaluationCompleted(EvaluationCompleted),
    /// See [`GateOverridden`].
    GateOverridden(GateOverridden),
    /// See [`PersistenceRetryExhausted`].
    PersistenceRetryExhausted(PersistenceRetryExhausted),
    /// See [`GenerativeModelFallback`].
    GenerativeModelFallback(GenerativeModelFallback),
    /// See [`JobRunCompleted`].
    JobRunCompleted(JobRunCompleted),
    /// See [`DriftAlertRaised`].
    DriftAlertRaised(DriftAlertRaised),
}

/// A [`Telemetry`] sink that appends every event to an in-memory log under
/// a mutex, for use in tests.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingTelemetry {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every event recorded so far.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned, which only happens if a
    /// prior caller panicked while holding the lock.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        #[allow(
            clippy::unwrap_used,
            reason = "Test-only helper; a poisoned lock indicates a prior test panic."
        )]
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: RecordedEvent) {
        #[allow(
            clippy::unwrap_used,
            reason = "Test-only helper; a poisoned lock indicates a prior test panic."
        )]
        self.events.lock().unwrap().push(event);
    }
}

impl Clone for RecordedEvent {
    fn clone(&self) -> Self {
        match self {
            Self::EvaluationCompleted(event) => Self::EvaluationCompleted(event.clone()),
            Self::GateOverridden(event) => Self::GateOverridden(event.clone()),
            Self::PersistenceRetryExhausted(event) => {
                Self::PersistenceRetryExhausted(event.clone())
            }
            Self::GenerativeModelFallback(event) => Self::GenerativeModelFallback(event.clone()),
            Self::JobRunCompleted(event) => Self::JobRunCompleted(event.clone()),
            Self::DriftAlertRaised(event) => Self::DriftAlertRaised(event.clone()),
        }
    }
}

impl Telemetry for RecordingTelemetry {
    fn evaluation_completed(&self, event: EvaluationCompleted) {
        self.push(RecordedEvent::EvaluationCompleted(event));
    }

    fn gate_overridden(&self, event: GateOverridden) {
        self.push(RecordedEvent::GateOverridden(event));
    }

    fn persistence_retry_exhausted(&self, event: PersistenceRetryExhausted) {
        self.push(RecordedEvent::PersistenceRetryExhausted(event));
    }

    fn generative_model_fallback(&self, event: GenerativeModelFallback) {
        self.push(RecordedEvent::GenerativeModelFallback(event));
    }

    fn job_run_completed(&self, event: JobRunCompleted) {
        self.push(RecordedEvent::JobRunCompleted(event));
    }

    fn drift_alert_raised(&self, event: DriftAlertRaised) {
        self.push(RecordedEvent::DriftAlertRaised(event));
    }
}
