// crates/ava-core/src/lib.rs
// ============================================================================
// Crate: ava-core
// Description: Data model, pure scoring/gating/grading logic, and the
//              repository contracts the rest of the AVA workspace implements.
// ============================================================================

//! ## Overview
//! `ava-core` has no I/O beyond the trait seams it defines in [`repo`]. It
//! holds:
//! - the data model (`model`),
//! - the pure signal adjusters, composite/tier resolver, and gate engine
//!   (`signals`, `composite`, `gates`) orchestrated by `mswim_engine`,
//! - the quality grader (`quality`) and variant assigner (`variant`),
//! - the shared error taxonomy (`error`) and telemetry trait (`telemetry`),
//! - a wall-clock abstraction (`clock`),
//! - opaque identifiers (`identifiers`), and
//! - the repository trait contracts (`repo`) every leaf crate implements.

pub mod clock;
pub mod composite;
pub mod error;
pub mod gates;
pub mod identifiers;
pub mod model;
pub mod mswim_engine;
pub mod quality;
pub mod repo;
pub mod signals;
pub mod telemetry;
pub mod variant;
