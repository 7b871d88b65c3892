// crates/ava-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for the CLI's pure argument-resolution and
//              error-to-exit-code helpers.
// ============================================================================

//! ## Overview
//! Covers the logic in `main.rs` that does not need a store to exercise:
//! path resolution and the error-to-exit-code mapping.

use std::path::PathBuf;

use super::CliError;
use super::resolve_db_path;

#[test]
fn resolve_db_path_prefers_explicit_argument() {
    let resolved = resolve_db_path(Some(PathBuf::from("/tmp/explicit.db")));
    assert_eq!(resolved, PathBuf::from("/tmp/explicit.db"));
}

#[test]
fn resolve_db_path_falls_back_to_default_name() {
    // Nothing in this crate's own test process sets `AVA_DB_PATH`, so an
    // absent explicit argument resolves to the documented default.
    let resolved = resolve_db_path(None);
    assert_eq!(resolved, PathBuf::from("ava.db"));
}

#[test]
fn exit_code_maps_configuration_errors_to_two() {
    let err = CliError::Configuration("bad path".to_owned());
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn exit_code_maps_failures_to_one() {
    let err = CliError::Failed("store unavailable".to_owned());
    assert_eq!(err.exit_code(), 1);
}
