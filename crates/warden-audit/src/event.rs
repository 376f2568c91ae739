//! Audit record and log types.
//!
//! `AuditRecord` is a single entry in the hash chain: an `AuditEvent` from
//! the pipeline plus sequence numbering, a timestamp and the SHA-256 hashes
//! that make tampering detectable. `AuditLog` is the sealed export of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_contracts::agent::AgentId;

/// A single entry in the SHA-256 hash chain for one run.
///
/// Each record commits to the previous one via `prev_hash`. Modifying any
/// field invalidates `this_hash` and every later `prev_hash`, which
/// `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub run_id: String,

    pub timestamp: DateTime<Utc>,

    pub agent_id: AgentId,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    /// Hex SHA-256 of the previous record, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Hex SHA-256 of this record, as computed by `hash_record()`.
    pub this_hash: String,
}

impl AuditRecord {
    /// The `prev_hash` of the first record in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed export of every record written during one run.
///
/// `terminal_hash` is the last record's `this_hash` and commits to the whole
/// log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub run_id: String,

    pub records: Vec<AuditRecord>,

    pub exported_at: DateTime<Utc>,

    /// Empty when the log has no records.
    pub terminal_hash: String,
}
