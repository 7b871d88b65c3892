// crates/ava-store-sqlite/src/codec.rs
// ============================================================================
// Module: JSON Snapshot Codec
// Description: Deterministic encode + hash-verified decode for the JSON
//              blobs every table stores alongside its indexed columns.
// ============================================================================

//! Every row stores its entity as a JSON blob plus a SHA-256 hex digest of
//! that blob, the same shape as the teacher's `state_json` / `state_hash`
//! columns. `serde_json`'s struct-field serialization order is stable (it
//! follows declaration order), so this does not need RFC 8785 canonicalization
//! on top: there is no cross-implementation interop requirement here, only
//! "did this row get corrupted on disk".

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Digest;
use sha2::Sha256;

use crate::error::SqliteStoreError;

/// Encodes `value` as JSON bytes and returns them alongside a hex SHA-256
/// digest of those bytes.
///
/// # Errors
/// Returns [`SqliteStoreError::Invalid`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<(Vec<u8>, String), SqliteStoreError> {
    let bytes =
        serde_json::to_vec(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let digest = hash_hex(&bytes);
    Ok((bytes, digest))
}

/// Verifies `bytes` against `expected_hash` and deserializes into `T`.
///
/// # Errors
/// Returns [`SqliteStoreError::Corrupt`] on a hash mismatch, or
/// [`SqliteStoreError::Invalid`] if deserialization fails.
pub fn decode<T: DeserializeOwned>(
    bytes: &[u8],
    expected_hash: &str,
) -> Result<T, SqliteStoreError> {
    let actual = hash_hex(bytes);
    if actual != expected_hash {
        return Err(SqliteStoreError::Corrupt(format!(
            "stored hash {expected_hash} does not match computed hash {actual}"
        )));
    }
    serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
