// crates/ava-store-sqlite/src/counters.rs
// ============================================================================
// Module: Operational Counters
// Description: Per-store read/write/retry counters exposed for operator
//              visibility; no histogram or latency tracking, just counts.
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Point-in-time read of a [`OpCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCountsSnapshot {
    /// Total successful read operations.
    pub reads: u64,
    /// Total successful write operations.
    pub writes: u64,
    /// Total `SQLITE_BUSY`/`SQLITE_LOCKED` retries absorbed by `busy_timeout`.
    pub retries: u64,
}

/// Atomic read/write/retry counters shared across every repo impl on a
/// [`crate::store::SqliteStore`].
#[derive(Debug, Default)]
pub struct OpCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    retries: AtomicU64,
}

impl OpCounters {
    /// Records one read operation.
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one write operation.
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one busy retry.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all three counters.
    #[must_use]
    pub fn snapshot(&self) -> OpCountsSnapshot {
        OpCountsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
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

    use super::OpCounters;

    #[test]
    fn snapshot_reflects_recorded_operations() {
        let counters = OpCounters::default();
        counters.record_read();
        counters.record_read();
        counters.record_write();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.reads, 2);
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.retries, 0);
    }
}
