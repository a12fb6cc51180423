use sha2::{Digest, Sha256};

use crate::domain::replication::Row;
use crate::domain::value_objects::Fingerprint;

/// Compute a SHA-256 fingerprint of a transferred row set.
///
/// Algorithm:
/// 1. Each row is serialised to a canonical JSON array string (cell order is
///    the snapshot's column order, so equal rows serialise identically).
/// 2. Rows are sorted lexicographically by their JSON representation so the
///    fingerprint is stable regardless of the order rows are returned by the DB.
/// 3. All row strings are joined with `\n` and hashed with SHA-256.
///
/// An empty row set produces a well-defined fingerprint (hash of empty string),
/// so schema-only copies still carry a comparable value.
pub fn fingerprint(rows: &[Row]) -> Fingerprint {
    let mut row_strings: Vec<String> = rows
        .iter()
        .map(|row| serde_json::to_string(row).unwrap_or_default())
        .collect();

    // Result-set order differs between servers; sort before hashing.
    row_strings.sort_unstable();

    let content = row_strings.join("\n");
    let hash = Sha256::digest(content.as_bytes());
    Fingerprint(format!("{:x}", hash))
}
