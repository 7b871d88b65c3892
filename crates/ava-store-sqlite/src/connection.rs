// crates/ava-store-sqlite/src/connection.rs
// ============================================================================
// Module: Connection and Schema
// Description: Opening the backing SQLite file, applying pragmas, and
//              creating/migrating the table set every repo impl reads from.
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::error::SqliteStoreError;

/// Schema version this build expects. Bumped whenever `initialize_schema`
/// changes the table set in a way older rows cannot read.
const SCHEMA_VERSION: i64 = 1;

/// Connection and durability settings for a [`crate::store::SqliteStore`].
///
/// Scoped down from a configurable journal/sync-mode matrix to the one
/// combination this workspace actually runs: WAL journaling with `NORMAL`
/// synchronous durability, which is safe under WAL and avoids a full fsync
/// on every write.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file. `:memory:` opens a private
    /// in-memory database, used by tests.
    pub path: PathBuf,
    /// `busy_timeout` applied to the connection, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Number of pooled read-only connections held alongside the single
    /// writer connection.
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Builds a config pointed at `path` with the documented defaults:
    /// a 5 second busy timeout and a 4-connection read pool.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: 5_000,
            read_pool_size: 4,
        }
    }

    /// Builds a config for a private in-memory database, used by tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// Opens `config`'s database file (creating it and its parent directory if
/// absent), applies pragmas, and runs schema migration.
pub fn open_and_initialize(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let conn = open_connection(config)?;
    apply_pragmas(&conn, config)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Opens a connection in read-write-create mode.
pub fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if config.is_in_memory() {
        return Connection::open_in_memory().map_err(SqliteStoreError::from);
    }
    validate_store_path(&config.path)?;
    ensure_parent_dir(&config.path)?;
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(&config.path, flags).map_err(SqliteStoreError::from)
}

/// Opens a read-only connection against an already-created database file,
/// for the read pool.
pub fn open_read_only(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    if config.is_in_memory() {
        return Connection::open_in_memory().map_err(SqliteStoreError::from);
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&config.path, flags)?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(conn)
}

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.is_dir() {
        return Err(SqliteStoreError::InvalidPath(format!(
            "{} is a directory, not a file",
            path.display()
        )));
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|err| {
                SqliteStoreError::InvalidPath(format!(
                    "could not create parent directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Applies the connection's pragmas: foreign keys on, WAL journaling (a
/// no-op but harmless for `:memory:`), `NORMAL` synchronous, and the
/// configured busy timeout.
pub fn apply_pragmas(conn: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    if !config.is_in_memory() {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Creates the full table set if absent, recording the schema version in
/// `store_meta`. A version mismatch against an existing database is
/// rejected rather than silently migrated, since no prior version has ever
/// shipped.
pub fn initialize_schema(conn: &Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let existing_version: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match existing_version {
        Some(version) if version == SCHEMA_VERSION.to_string() => return Ok(()),
        Some(version) => {
            return Err(SqliteStoreError::InvalidPath(format!(
                "database schema version {version} is incompatible with build version {SCHEMA_VERSION}"
            )));
        }
        None => {}
    }

    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    visitor_key TEXT NOT NULL,
    session_key TEXT NOT NULL,
    site_url TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL,
    UNIQUE (visitor_key, session_key)
);
CREATE INDEX IF NOT EXISTS idx_sessions_last_seen ON sessions (last_seen_at);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    page_type TEXT NOT NULL,
    ts TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_session_ts ON events (session_id, ts);
CREATE INDEX IF NOT EXISTS idx_events_page_ts ON events (page_type, ts);

CREATE TABLE IF NOT EXISTS evaluations (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    evaluated_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_evaluations_session ON evaluations (session_id, evaluated_at);

CREATE TABLE IF NOT EXISTS interventions (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interventions_session ON interventions (session_id, created_at);
CREATE INDEX IF NOT EXISTS idx_interventions_status ON interventions (status);

CREATE TABLE IF NOT EXISTS scoring_configs (
    id TEXT PRIMARY KEY,
    site_url TEXT,
    is_active INTEGER NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scoring_configs_scope ON scoring_configs (site_url, is_active);

CREATE TABLE IF NOT EXISTS training_datapoints (
    id TEXT PRIMARY KEY,
    intervention_id TEXT NOT NULL UNIQUE,
    outcome TEXT NOT NULL,
    tier TEXT NOT NULL,
    site_url TEXT NOT NULL,
    friction_id TEXT,
    created_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_training_datapoints_filter
    ON training_datapoints (site_url, tier, outcome, created_at);

CREATE TABLE IF NOT EXISTS shadow_comparisons (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    site_url TEXT NOT NULL,
    tier_match INTEGER NOT NULL,
    decision_match INTEGER NOT NULL,
    composite_divergence REAL NOT NULL,
    recorded_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_shadow_session ON shadow_comparisons (session_id);
CREATE INDEX IF NOT EXISTS idx_shadow_site_time ON shadow_comparisons (site_url, recorded_at);
CREATE INDEX IF NOT EXISTS idx_shadow_divergence ON shadow_comparisons (recorded_at, composite_divergence);

CREATE TABLE IF NOT EXISTS drift_snapshots (
    id TEXT PRIMARY KEY,
    window_type TEXT NOT NULL,
    site_url TEXT,
    window_end TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_drift_snapshots_scope ON drift_snapshots (window_type, site_url, window_end);

CREATE TABLE IF NOT EXISTS drift_alerts (
    id TEXT PRIMARY KEY,
    alert_type TEXT NOT NULL,
    site_url TEXT,
    acknowledged INTEGER NOT NULL,
    detected_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_drift_alerts_unack ON drift_alerts (acknowledged, alert_type, site_url);

CREATE TABLE IF NOT EXISTS experiments (
    id TEXT PRIMARY KEY,
    site_url TEXT,
    status TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rollouts (
    id TEXT PRIMARY KEY,
    site_url TEXT NOT NULL,
    status TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rollouts_site_status ON rollouts (site_url, status);

CREATE TABLE IF NOT EXISTS job_runs (
    id TEXT PRIMARY KEY,
    job_name TEXT NOT NULL,
    started_at TEXT NOT NULL,
    json BLOB NOT NULL,
    hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_job_runs_name_started ON job_runs (job_name, started_at);
";

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::SqliteStoreConfig;
    use super::open_and_initialize;
    use super::initialize_schema;

    #[test]
    fn initializes_schema_on_fresh_in_memory_db() {
        let config = SqliteStoreConfig::in_memory();
        let conn = open_and_initialize(&config).expect("open");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
                row.get(0)
            })
            .expect("count tables");
        assert!(count >= 12);
    }

    #[test]
    fn re_initializing_an_already_current_schema_is_a_no_op() {
        let config = SqliteStoreConfig::in_memory();
        let conn = open_and_initialize(&config).expect("open");
        initialize_schema(&conn).expect("idempotent re-init");
    }
}
