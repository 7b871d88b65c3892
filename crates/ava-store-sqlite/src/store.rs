// crates/ava-store-sqlite/src/store.rs
// ============================================================================
// Module: Store
// Description: The shared connection handle every repo impl is built on: one
//              writer connection behind a mutex, an optional round-robin pool
//              of read-only connections, and the operational counters.
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rusqlite::Connection;

use crate::connection::SqliteStoreConfig;
use crate::connection::open_and_initialize;
use crate::connection::open_read_only;
use crate::counters::OpCounters;
use crate::counters::OpCountsSnapshot;
use crate::error::SqliteStoreError;

/// SQLite-backed implementation of every repository trait in
/// `ava_core::repo`. Cheap to clone: the connection(s) and counters are
/// held behind `Arc`.
#[derive(Clone)]
pub struct SqliteStore {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<Vec<Mutex<Connection>>>,
    next_reader: Arc<AtomicUsize>,
    counters: Arc<OpCounters>,
}

impl SqliteStore {
    /// Opens (creating if absent) the database at `config.path`, applies
    /// pragmas, runs schema migration, and opens the read-connection pool.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the file cannot be opened, the path
    /// is invalid, or schema migration fails.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let writer = open_and_initialize(&config)?;
        let readers = if config.path.as_os_str() == ":memory:" {
            // A private in-memory database is not visible to a second
            // connection; reads fall back to sharing the writer connection.
            Vec::new()
        } else {
            let mut readers = Vec::with_capacity(config.read_pool_size);
            for _ in 0..config.read_pool_size {
                readers.push(Mutex::new(open_read_only(&config)?));
            }
            readers
        };
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers: Arc::new(readers),
            next_reader: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(OpCounters::default()),
        })
    }

    /// Returns a point-in-time snapshot of this store's operational
    /// counters.
    #[must_use]
    pub fn op_counts(&self) -> OpCountsSnapshot {
        self.counters.snapshot()
    }

    /// Locks the writer connection and runs `f` against it, recording one
    /// write on success.
    pub(crate) fn with_write<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, SqliteStoreError> {
        let conn = self.lock_writer();
        let result = f(&conn)?;
        self.counters.record_write();
        Ok(result)
    }

    /// Locks a read connection (round-robin over the pool, or the writer if
    /// no pool is configured) and runs `f` against it, recording one read on
    /// success.
    pub(crate) fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, SqliteStoreError> {
        let result = if self.readers.is_empty() {
            let conn = self.lock_writer();
            f(&conn)?
        } else {
            let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
            let conn = self.lock_reader(index);
            f(&conn)?
        };
        self.counters.record_read();
        Ok(result)
    }

    fn lock_writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_reader(&self, index: usize) -> MutexGuard<'_, Connection> {
        self.readers[index]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
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

    use super::SqliteStore;
    use crate::connection::SqliteStoreConfig;

    #[test]
    fn open_in_memory_succeeds_and_starts_with_zeroed_counters() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        let counts = store.op_counts();
        assert_eq!(counts.reads, 0);
        assert_eq!(counts.writes, 0);
    }

    #[test]
    fn with_write_increments_the_write_counter() {
        let store = SqliteStore::open(SqliteStoreConfig::in_memory()).expect("open");
        store
            .with_write(|conn| conn.execute("INSERT INTO store_meta (key, value) VALUES ('x', 'y')", []))
            .expect("write");
        assert_eq!(store.op_counts().writes, 1);
    }
}
