// crates/ava-core/src/identifiers.rs
// ============================================================================
// Module: AVA Identifiers
// Description: Canonical opaque identifiers for sessions, events, and decisions.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers threaded through the evaluation
//! pipeline and the control plane. All identifiers are opaque strings on the
//! wire; no normalization is applied beyond what the constructor documents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Defines an opaque, string-backed, serializable identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_id! {
    /// Session identifier assigned on first ingress of a visitor/session pair.
    ///
    /// # Invariants
    /// - Stable for the lifetime of the session.
    SessionId
}

string_id! {
    /// Widget-supplied visitor identity, stable across sessions for a device.
    VisitorKey
}

string_id! {
    /// Widget-supplied per-session key; paired with [`VisitorKey`] as the
    /// secondary lookup key for a [`SessionId`].
    SessionKey
}

string_id! {
    /// Storefront origin a session belongs to.
    ///
    /// # Invariants
    /// - Used as the primary scope key for scoring configs and rollouts.
    SiteUrl
}

string_id! {
    /// Identifier of an ingested [`crate::model::event::TrackEvent`].
    EventId
}

string_id! {
    /// Friction catalog identifier, e.g. `"F068"`.
    FrictionId
}

string_id! {
    /// Identifier of a persisted MSWIM evaluation.
    EvaluationId
}

string_id! {
    /// Identifier of a persisted [`crate::model::intervention::Intervention`].
    InterventionId
}

string_id! {
    /// Identifier of a persisted training datapoint.
    TrainingDatapointId
}

string_id! {
    /// Identifier of a stored [`crate::model::scoring_config::ScoringConfig`].
    ScoringConfigId
}

string_id! {
    /// Identifier of a persisted shadow comparison.
    ShadowComparisonId
}

string_id! {
    /// Identifier of a persisted drift snapshot.
    DriftSnapshotId
}

string_id! {
    /// Identifier of a persisted drift alert.
    DriftAlertId
}

string_id! {
    /// Identifier of an A/B experiment.
    ExperimentId
}

string_id! {
    /// Identifier of an experiment variant, unique within its experiment.
    VariantId
}

string_id! {
    /// Identifier of a staged configuration rollout.
    RolloutId
}

string_id! {
    /// Identifier of a scheduled/manual job run.
    JobRunId
}
