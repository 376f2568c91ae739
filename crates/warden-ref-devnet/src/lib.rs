//! # warden-ref-devnet
//!
//! Reference runtime for WARDEN: everything needed to run agents end to end
//! without a network.
//!
//! - [`SimLedger`]: an in-process ledger with signature checks, fees,
//!   blockhash expiry and the counter program.
//! - [`strategies`]: `SimpleTransferStrategy`, `TreasuryAllocatorStrategy`
//!   and `CounterIncrementStrategy`, registered under `simple_transfer`,
//!   `treasury` and `counter_increment`.
//! - [`run_round_robin`]: each agent acts with the next one as its
//!   counterparty.

pub mod ledger;
pub mod runner;
pub mod strategies;

pub use ledger::{CallCounts, SimLedger};
pub use runner::{provision, run_round_robin, Participant, TurnReport};
pub use strategies::reference_registry;
