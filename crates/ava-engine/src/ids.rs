// crates/ava-engine/src/ids.rs
// ============================================================================
// Module: Evaluation-Pipeline Identifier Generator
// Description: Boot-scoped, monotonic identifier minting for entities the
//              evaluator creates at runtime.
// ============================================================================

//! Grounded on the correlation id generator used for MCP request ids: a
//! random boot id plus a monotonic counter, so ids are unique across process
//! restarts without a central allocator or a UUID dependency.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;

/// Mints `"{prefix}-{boot_id:016x}-{seq:016x}"` identifiers, unique within a
/// process and, modulo collision of the random boot id, across processes.
pub struct IdGenerator {
    prefix: &'static str,
    boot_id: u64,
    counter: AtomicU64,
}

impl IdGenerator {
    /// Builds a generator that prefixes every minted id with `prefix`.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        let mut bytes = [0_u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            prefix,
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Mints the next identifier in the sequence.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, seq)
    }
}
