//! Purpose: Content fingerprint used as the `lock_version` optimistic-concurrency stamp.
//! Exports: `stamp`.
//! Role: Opaque marker; callers only ever compare stamps for equality.
//! Invariants: Deterministic function of record content; `index` never participates.
//! Invariants: Output is 32 lowercase hex characters (16 digest bytes), zero-padded.

use crate::core::record::Record;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

const STAMP_BYTES: usize = 16;

/// Hash the record's canonical JSON serialization. Key order is stable because
/// `Record` is sorted, so the stamp depends only on column content.
pub fn stamp(record: &Record) -> String {
    let mut canonical = serde_json::Map::new();
    for (column, value) in record {
        let _ = canonical.insert(column.clone(), value.to_json());
    }
    let serialized = serde_json::Value::Object(canonical).to_string();
    let digest = Sha256::digest(serialized.as_bytes());

    let mut out = String::with_capacity(STAMP_BYTES * 2);
    for byte in &digest[..STAMP_BYTES] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
