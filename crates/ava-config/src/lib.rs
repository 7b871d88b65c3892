// crates/ava-config/src/lib.rs
// ============================================================================
// Crate: ava-config
// Description: Boot-time process configuration and runtime-reloadable
//              per-site scoring configuration.
// ============================================================================

//! Two distinct configuration layers:
//!
//! - [`boot::AvaConfig`]: read once from the environment at process start.
//!   A validation failure here is fatal.
//! - [`loader::ConfigLoader`]: a TTL-cached resolver over
//!   [`ava_core::repo::ScoringConfigRepo`] for the per-site, hot-reloadable
//!   [`ava_core::model::scoring_config::ScoringConfig`].

pub mod boot;
pub mod loader;
