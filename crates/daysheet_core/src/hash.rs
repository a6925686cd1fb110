//! Content hashing over canonical row serialization.
//!
//! The hash detects content drift independently of the version counter.
//! Canonical form: rows sorted by row key, serialized as compact JSON with
//! the struct field order. Two sheets holding the same rows in different
//! payload orders therefore hash identically.

use crate::types::Row;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 content hash for a set of rows.
///
/// The input order does not matter; rows are sorted by key before hashing.
pub fn content_hash(rows: &[Row]) -> String {
    let mut sorted: Vec<&Row> = rows.iter().collect();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));

    let mut hasher = Sha256::new();
    for row in sorted {
        // Serialization of a plain struct cannot fail.
        let bytes = serde_json::to_vec(row).unwrap_or_default();
        hasher.update(&bytes);
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
