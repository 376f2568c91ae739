//! The ledger seam.
//!
//! The engine never talks to a network directly. It is handed something that
//! implements `Ledger` and calls it for balances, account reads, freshness
//! anchors, dry runs, broadcast, and confirmation.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{LedgerError, WardenError},
    transaction::{FreshnessAnchor, SignedTransaction},
};

/// How settled a transaction must be before confirmation returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        })
    }
}

impl FromStr for Commitment {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(WardenError::Config {
                reason: format!("unknown commitment level '{other}'"),
            }),
        }
    }
}

/// A raw account as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
}

/// Result of a dry run. `error` is set when the ledger would reject the
/// transaction; the call itself still succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything the runtime needs from a ledger.
///
/// Implementations must be safe to share between concurrently executing
/// agents.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Spendable balance in lamports. Unknown addresses have balance zero.
    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError>;

    /// The account at `address`, or `None` if it does not exist.
    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError>;

    /// A fresh blockhash and the last height at which it is accepted.
    async fn latest_anchor(&self) -> Result<FreshnessAnchor, LedgerError>;

    /// Evaluate `tx` without committing it.
    async fn simulate(&self, tx: &SignedTransaction) -> Result<SimulationReport, LedgerError>;

    /// Submit `tx`. Returns the transaction signature.
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String, LedgerError>;

    /// Wait until `signature` reaches `commitment`, or fail once `anchor`
    /// has expired without the transaction landing.
    async fn confirm(
        &self,
        signature: &str,
        anchor: &FreshnessAnchor,
        commitment: Commitment,
    ) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_parses_case_insensitively() {
        assert_eq!("Finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert_eq!(" processed ".parse::<Commitment>().unwrap(), Commitment::Processed);
        assert!(matches!(
            "eventually".parse::<Commitment>(),
            Err(WardenError::Config { .. })
        ));
    }

    #[test]
    fn commitment_defaults_to_confirmed() {
        assert_eq!(Commitment::default(), Commitment::Confirmed);
        assert_eq!(serde_json::to_string(&Commitment::Confirmed).unwrap(), "\"confirmed\"");
    }
}
