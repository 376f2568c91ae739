//! # warden-contracts
//!
//! Shared types, wire formats, and collaborator seams for the WARDEN runtime.
//!
//! All crates in the workspace import from here. Nothing in this crate does
//! I/O: it holds data definitions, the transaction encoding, the error
//! types, and the `Ledger` / `Signer` traits the engine is wired through.

pub mod address;
pub mod agent;
pub mod amount;
pub mod error;
pub mod intent;
pub mod ledger;
pub mod outcome;
pub mod policy;
pub mod transaction;

#[cfg(test)]
mod tests {
    use super::*;
    use agent::ExecutionId;
    use error::{LedgerError, PolicyViolation, WardenError};
    use rust_decimal_macros::dec;

    // ── ExecutionId ──────────────────────────────────────────────────────────

    #[test]
    fn execution_id_new_produces_unique_values() {
        let unique: std::collections::HashSet<String> =
            (0..100).map(|_| ExecutionId::new().to_string()).collect();
        assert_eq!(unique.len(), 100);
    }

    // ── WardenError display messages ─────────────────────────────────────────

    #[test]
    fn spend_cap_violation_names_both_values() {
        let err: WardenError = PolicyViolation::SpendCapExceeded {
            amount: dec!(0.5),
            cap: dec!(0.1),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("policy violation"));
        assert!(msg.contains("0.5"));
        assert!(msg.contains("0.1"));
    }

    #[test]
    fn recipient_violation_names_the_address() {
        let err = WardenError::PolicyViolation(PolicyViolation::RecipientNotAllowed {
            recipient: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
        });
        assert!(err.to_string().contains("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
    }

    #[test]
    fn decryption_error_has_no_detail() {
        assert_eq!(
            WardenError::Decryption.to_string(),
            "key record could not be decrypted"
        );
    }

    #[test]
    fn commit_failed_display_with_and_without_signature() {
        let with = WardenError::CommitFailed {
            signature: Some("sig123".to_string()),
            reason: "timeout".to_string(),
        };
        assert!(with.to_string().contains("sig123"));

        let without = WardenError::CommitFailed {
            signature: None,
            reason: "rpc down".to_string(),
        };
        assert!(without.to_string().contains("signature: none"));
    }

    #[test]
    fn ledger_error_is_transparent() {
        let err: WardenError = LedgerError::Rpc("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "ledger rpc error: connection refused");
    }

    #[test]
    fn simulation_failed_names_the_intent() {
        let err = WardenError::SimulationFailed {
            intent: "transfer_value".to_string(),
            reason: "insufficient funds".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("transfer_value"));
        assert!(msg.contains("insufficient funds"));
    }
}
