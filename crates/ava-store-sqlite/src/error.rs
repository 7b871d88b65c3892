// crates/ava-store-sqlite/src/error.rs
// ============================================================================
// Module: Store Error
// Description: The single error type every connection/schema/codec operation
//              produces, before each repo impl narrows it to its own trait's
//              error enum.
// ============================================================================

use thiserror::Error;

/// Failure opening, migrating, or reading/writing through a [`crate::store::SqliteStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying SQLite driver returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A JSON blob failed its stored hash check; the row is treated as
    /// corrupt rather than silently accepted.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// A value failed to serialize or deserialize.
    #[error("invalid value: {0}")]
    Invalid(String),
    /// The configured store path is unusable (not a file, parent missing
    /// and uncreatable, etc).
    #[error("invalid store path: {0}")]
    InvalidPath(String),
}

impl SqliteStoreError {
    /// Renders the error as the `String` every `*RepoError::Store` variant
    /// wraps.
    #[must_use]
    pub fn as_store_message(&self) -> String {
        self.to_string()
    }
}
