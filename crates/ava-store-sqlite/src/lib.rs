// crates/ava-store-sqlite/src/lib.rs
// ============================================================================
// Crate: ava-store-sqlite
// Description: SQLite-backed implementations of every repository trait in
//              ava_core::repo, behind a single SqliteStore handle.
// ============================================================================

//! ## Overview
//! `SqliteStore` is the one type this crate exports. It implements every
//! trait in `ava_core::repo`, each against its own table, so a caller that
//! only needs, say, `SessionRepo` and `EventRepo` can depend on those trait
//! objects while the concrete type wires up all ten behind the scenes.
//!
//! Every row stores its entity as a hash-verified JSON blob next to the
//! handful of columns its own repo's queries actually filter or sort on; see
//! [`codec`] for the encode/decode boundary and [`connection`] for the table
//! definitions.

pub mod codec;
pub mod connection;
pub mod counters;
pub mod error;
mod repos;
pub mod store;
mod time_fmt;

pub use connection::SqliteStoreConfig;
pub use counters::OpCountsSnapshot;
pub use error::SqliteStoreError;
pub use store::SqliteStore;
