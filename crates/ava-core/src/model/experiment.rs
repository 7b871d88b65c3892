// crates/ava-core/src/model/experiment.rs
// ============================================================================
// Module: Experiment
// Description: A/B experiment and its ordered, weighted variants.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ExperimentId;
use crate::identifiers::ScoringConfigId;
use crate::identifiers::SiteUrl;
use crate::identifiers::VariantId;

/// Lifecycle status of an [`Experiment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Created but not yet accepting traffic.
    Draft,
    /// Actively enrolling and serving sessions.
    Running,
    /// Temporarily not enrolling new sessions.
    Paused,
    /// Permanently closed.
    Ended,
}

/// Per-session-overridable evaluation engine selector: `fast`, `llm`, or
/// `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalEngine {
    /// Always call the generative model.
    Llm,
    /// Always synthesize hints deterministically.
    Fast,
    /// Start with `fast`, escalate to `llm` per the documented contract.
    Auto,
}

/// One arm of an [`Experiment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Unique within its experiment.
    pub id: VariantId,
    /// Human-readable name, e.g. `"control"`.
    pub name: String,
    /// Traffic share among enrolled sessions; all variants in an experiment
    /// sum to 1.0.
    pub weight: f64,
    /// Scoring config override for sessions enrolled in this variant.
    pub scoring_config_id: Option<ScoringConfigId>,
    /// Evaluation-engine override for sessions enrolled in this variant.
    pub eval_engine: Option<EvalEngine>,
}

/// A running (or draft/paused/ended) A/B experiment.
///
/// # Invariants
/// - `variants` is non-empty and its weights sum to 1.0 within tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique identifier.
    pub id: ExperimentId,
    /// Human-readable name.
    pub name: String,
    /// Site this experiment is scoped to, or `None` for all sites.
    pub site_url: Option<SiteUrl>,
    /// Lifecycle status.
    pub status: ExperimentStatus,
    /// Share of sessions enrolled, `1..=100`.
    pub traffic_percent: u8,
    /// Ordered arms.
    pub variants: Vec<Variant>,
    /// Metric the rollout controller's health checks read from this
    /// experiment's treatment variant.
    pub primary_metric: String,
}

impl Experiment {
    /// Returns `true` if `variants` is non-empty and its weights sum to
    /// within `1e-6` of 1.0.
    #[must_use]
    pub fn has_valid_variant_weights(&self) -> bool {
        if self.variants.is_empty() {
            return false;
        }
        let total: f64 = self.variants.iter().map(|variant| variant.weight).sum();
        (total - 1.0).abs() < 1e-6
    }
}
