// crates/ava-core/src/model/rollout.rs
// ============================================================================
// Module: Rollout
// Description: A staged configuration rollout, traffic-split via a linked
//              two-variant experiment, with health-driven promote/rollback.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::ExperimentId;
use crate::identifiers::RolloutId;
use crate::identifiers::ScoringConfigId;
use crate::identifiers::SiteUrl;
use crate::model::experiment::EvalEngine;

/// What kind of change a [`Rollout`] is staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeType {
    /// Roll out a new active [`crate::model::scoring_config::ScoringConfig`].
    ScoringConfig(ScoringConfigId),
    /// Roll out a new default evaluation engine.
    EvalEngine(EvalEngine),
}

/// One stage of a [`Rollout`]: the traffic percent it ramps to, how long it
/// must hold before becoming eligible for promotion, and the health
/// criteria gating that promotion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RolloutStage {
    /// Traffic percent this stage ramps the treatment variant to, `1..=100`.
    pub percent: u8,
    /// Minimum hours this stage must hold before becoming promotable.
    pub duration_hours: u32,
    /// Health criteria gating promotion out of this stage.
    pub health_checks: HealthCriteria,
}

/// Thresholds a rollout's current stage is evaluated against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthCriteria {
    /// Minimum treatment-variant sample size before a recommendation is
    /// anything but `hold`.
    pub min_sample_size: u64,
    /// Minimum acceptable treatment-variant conversion rate.
    pub min_conversion_rate: f64,
    /// Maximum acceptable treatment-variant dismissal rate.
    pub max_dismissal_rate: f64,
}

/// Lifecycle status of a [`Rollout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStatus {
    /// Created but not started.
    Pending,
    /// Actively progressing through stages.
    Rolling,
    /// Temporarily halted.
    Paused,
    /// Reached its final stage and activated the new config.
    Completed,
    /// Aborted; the active config was left unchanged.
    RolledBack,
}

/// Outcome of the most recent [`crate::model::rollout::HealthCriteria`]
/// evaluation for a rolling rollout's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthRecommendation {
    /// All criteria pass and the stage has held long enough to advance.
    Promote,
    /// Sample too small, or a non-critical criterion failed.
    Hold,
    /// Sample adequate and conversion/dismissal crossed the rollback bound.
    Rollback,
}

/// A staged change to configuration, traffic-split via a linked two-variant
/// experiment, with automated health-driven promotion or rollback.
///
/// # Invariants
/// - `stages` is non-empty and its final stage has `percent == 100`.
/// - At most one `Rolling` rollout per `site_url` at a time (enforced by the
///   rollout controller, not by this type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rollout {
    /// Unique identifier.
    pub id: RolloutId,
    /// Human-readable name.
    pub name: String,
    /// Site this rollout applies to.
    pub site_url: SiteUrl,
    /// What is being rolled out.
    pub change_type: ChangeType,
    /// Ordered stages; see invariants.
    pub stages: Vec<RolloutStage>,
    /// Lifecycle status.
    pub status: RolloutStatus,
    /// Index into `stages` of the current stage.
    pub current_stage: usize,
    /// Instant the rollout was started (transitioned out of `Pending`).
    pub started_at: Option<OffsetDateTime>,
    /// The linked two-variant experiment driving traffic split.
    pub experiment_id: Option<ExperimentId>,
    /// Instant of the most recent health check.
    pub last_health_check: Option<OffsetDateTime>,
    /// Outcome of the most recent health check.
    pub last_health_status: Option<HealthRecommendation>,
}

impl Rollout {
    /// Returns `true` if `stages` is non-empty and its final stage has
    /// `percent == 100`.
    #[must_use]
    pub fn has_valid_stages(&self) -> bool {
        self.stages.last().is_some_and(|stage| stage.percent == 100)
    }

    /// Returns the current [`RolloutStage`], if `current_stage` is in range.
    #[must_use]
    pub fn current_stage(&self) -> Option<&RolloutStage> {
        self.stages.get(self.current_stage)
    }

    /// Returns `true` if `current_stage` indexes the final stage.
    #[must_use]
    pub fn is_final_stage(&self) -> bool {
        self.current_stage + 1 == self.stages.len()
    }
}
