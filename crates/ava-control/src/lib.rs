// crates/ava-control/src/lib.rs
// ============================================================================
// Crate: ava-control
// Description: The control plane: staged rollout lifecycle, drift detection,
//              and the nightly/hourly/canary job runner.
// ============================================================================

//! ## Overview
//! [`rollout`] drives a staged [`ava_core::model::rollout::Rollout`] through
//! its linked experiment, evaluating treatment-arm health to recommend
//! promoting, holding, or rolling back a stage. [`drift`] aggregates
//! shadow/production agreement and outcome rates into window snapshots and
//! raises de-duplicated alerts when they breach configured thresholds.
//! [`eval_harness`] pins known MSWIM scenarios against their expected tier
//! and decision so a scoring-config change that silently shifts behavior is
//! caught before it reaches production. [`job_runner`] ties all three
//! together behind self-scheduling timers. [`ids`] mints the identifiers
//! the rollout controller, drift detector, and job runner issue at runtime.

pub mod drift;
pub mod eval_harness;
pub mod ids;
pub mod job_runner;
pub mod rollout;

pub use drift::DriftDetector;
pub use drift::DriftError;
pub use drift::DriftThresholds;
pub use eval_harness::Regression;
pub use eval_harness::run_regression_check;
pub use ids::IdGenerator;
pub use job_runner::JobRunner;
pub use rollout::RolloutController;
pub use rollout::RolloutError;
