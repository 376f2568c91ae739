//! Runtime error types for the WARDEN execution pipeline.
//!
//! All fallible operations in the WARDEN pipeline return `WardenResult<T>`.
//! Error variants carry the offending values (amount vs. cap, rejected
//! address) so an aborted execution can be diagnosed from the message alone.

use rust_decimal::Decimal;
use thiserror::Error;

/// A rejected intent. Surfaced to the caller, never retried or corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("spend cap exceeded: intended {amount}, cap {cap}")]
    SpendCapExceeded { amount: Decimal, cap: Decimal },

    #[error("recipient not allow-listed: {recipient}")]
    RecipientNotAllowed { recipient: String },

    #[error("program not allow-listed: {program}")]
    ProgramNotAllowed { program: String },
}

/// Failures reported by the external ledger capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport-level failure talking to the ledger.
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    /// The ledger evaluated the transaction and rejected it.
    #[error("transaction execution error: {0}")]
    Execution(String),

    /// The freshness anchor embedded in the transaction is no longer valid.
    #[error("blockhash expired: valid until height {last_valid_block_height}, ledger at {current_height}")]
    BlockhashExpired {
        last_valid_block_height: u64,
        current_height: u64,
    },

    /// The ledger has no record of the requested transaction.
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("ledger operation timed out: {0}")]
    Timeout(String),
}

/// The unified error type for the WARDEN runtime.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A collaborator was missing or does not provide the capability the
    /// runtime needs. A programmer error, never retried.
    #[error("wiring error: {reason}")]
    Wiring { reason: String },

    /// The intent failed a policy check before compilation.
    #[error("policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    /// Wrong passphrase or corrupted key record. Deliberately carries no
    /// detail about which step failed.
    #[error("key record could not be decrypted")]
    Decryption,

    /// The dry run reported an execution error. Nothing reached the ledger.
    #[error("simulation failed for {intent}: {reason}")]
    SimulationFailed { intent: String, reason: String },

    /// Broadcast or confirmation failed. When `signature` is set the
    /// transaction was handed to the ledger and may still land.
    #[error("commit failed (signature: {}): {reason}", .signature.as_deref().unwrap_or("none"))]
    CommitFailed {
        signature: Option<String>,
        reason: String,
    },

    /// Program account bytes did not match the expected schema.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The key store could not be read or written.
    #[error("key store error: {reason}")]
    KeyStore { reason: String },

    /// `create` was called for an agent that already has a key record.
    #[error("key record already exists for agent '{agent_id}'")]
    KeyExists { agent_id: String },

    /// The intent is malformed independent of any policy (e.g. a negative amount).
    #[error("invalid intent: {reason}")]
    InvalidIntent { reason: String },

    /// A ledger read failed outside of the simulate/commit stages.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;
