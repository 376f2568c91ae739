//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. timestamp as RFC 3339 with nanoseconds
//!   5. agent_id, message and compact JSON of extra (`null` when absent),
//!      each prefixed with its length as 8-byte little-endian
//!
//! Length prefixes keep field boundaries unambiguous, so moving bytes from
//! `message` into `agent_id` changes the hash.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::event::AuditRecord;

/// Compute the hex SHA-256 of `record`, ignoring its stored `this_hash`.
pub fn hash_record(record: &AuditRecord) -> String {
    let extra = record
        .extra
        .as_ref()
        .map_or_else(|| "null".to_string(), |v| v.to_string());

    let mut hasher = Sha256::new();
    hasher.update(record.run_id.as_bytes());
    hasher.update(record.sequence.to_le_bytes());
    hasher.update(record.prev_hash.as_bytes());
    hasher.update(
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    for field in [record.agent_id.as_str(), record.message.as_str(), extra.as_str()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify the integrity of a hash chain.
///
/// Valid when every record links to its predecessor (the first to
/// `GENESIS_HASH`), every sequence number equals its position, and every
/// stored `this_hash` matches the recomputed one. An empty chain is valid.
pub fn verify_chain(records: &[AuditRecord]) -> bool {
    let mut expected_prev: &str = AuditRecord::GENESIS_HASH;

    for (position, record) in records.iter().enumerate() {
        if record.sequence != position as u64 || record.prev_hash != expected_prev {
            return false;
        }
        if record.this_hash != hash_record(record) {
            return false;
        }
        expected_prev = record.this_hash.as_str();
    }

    true
}
