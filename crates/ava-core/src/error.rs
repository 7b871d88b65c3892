// crates/ava-core/src/error.rs
// ============================================================================
// Module: AVA Error Taxonomy
// Description: Shared error classification consumed across the workspace.
// Purpose: Give every crate a common `Severity` and a blanket `AvaError` that
//          leaf-crate errors convert into at module boundaries.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Leaf crates (`ava-store-sqlite`, `ava-providers`, ...) define their own
//! `thiserror` error enums for their own concerns. This module defines the
//! taxonomy those errors are classified into, and [`AvaError`], the type
//! callers at a crate boundary convert into when they need to cross into
//! code that only understands the taxonomy (the job runner, the CLI).

use thiserror::Error;

/// Severity classification for an [`AvaError`], used to decide whether a
/// failure is fatal, retryable, or merely worth recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A downstream RPC or write failed; the caller has a fallback or retry.
    TransientExternal,
    /// The caller supplied malformed or semantically invalid input.
    PermanentInput,
    /// Required configuration is missing or fails validation at boot.
    ConfigurationError,
    /// An internal invariant did not hold; the request proceeds with a
    /// clamped or defaulted value and the violation is recorded.
    InvariantViolation,
    /// The operation was suppressed by a gate or cap; not a failure.
    RateLimited,
}

/// The shared error type leaf crates convert their own errors into at a
/// module boundary that only understands the taxonomy, not crate-specific
/// detail.
#[derive(Debug, Error)]
pub enum AvaError {
    /// A downstream call or write failed and could not be recovered locally.
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// The caller supplied input that can never succeed as given.
    #[error("invalid input: {0}")]
    PermanentInput(String),

    /// Configuration is missing or invalid; the process must not start.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An internal invariant was violated; the value was clamped/defaulted.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The operation was suppressed by policy, not an error condition.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl AvaError {
    /// Returns the [`Severity`] this error was classified under.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::TransientExternal(_) => Severity::TransientExternal,
            Self::PermanentInput(_) => Severity::PermanentInput,
            Self::ConfigurationError(_) => Severity::ConfigurationError,
            Self::InvariantViolation(_) => Severity::InvariantViolation,
            Self::RateLimited(_) => Severity::RateLimited,
        }
    }

    /// Returns `true` for errors that abort the current boot or request
    /// rather than degrading gracefully.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationError(_))
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

    use super::AvaError;
    use super::Severity;

    #[test]
    fn configuration_errors_are_fatal() {
        let err = AvaError::ConfigurationError("missing api key".to_owned());
        assert!(err.is_fatal());
        assert_eq!(err.severity(), Severity::ConfigurationError);
    }

    #[test]
    fn invariant_violations_are_not_fatal() {
        let err = AvaError::InvariantViolation("composite out of range".to_owned());
        assert!(!err.is_fatal());
    }
}
