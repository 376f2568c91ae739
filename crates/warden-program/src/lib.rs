//! # warden-program
//!
//! Wire formats for the programs WARDEN agents invoke: the system transfer,
//! the memo program, and the per-agent counter program.
//!
//! Addresses and discriminators are pure functions of their inputs (SHA-256
//! with 8-byte truncation for discriminators). Reading counter accounts goes
//! through the [`Ledger`](warden_contracts::ledger::Ledger) seam and needs a
//! loaded IDL.

pub mod client;
pub mod discriminator;
pub mod idl;
pub mod pda;
pub mod system;

use warden_contracts::address::Address;

pub use client::{CounterAccount, CounterClient};
pub use idl::ProgramIdl;
pub use pda::{create_program_address, find_program_address};

/// The deployed counter program, `BtUk5jpsbzNB2yfR31RXecEHXgcMj4kDabZr3dzKthmW`.
pub const COUNTER_PROGRAM_ID: Address = Address([
    161, 196, 220, 1, 106, 66, 97, 11, 242, 179, 75, 108, 36, 166, 227, 195, 73, 178, 34, 67, 206,
    174, 131, 200, 175, 15, 208, 73, 216, 236, 32, 109,
]);

/// First PDA seed of every counter account.
pub const COUNTER_SEED: &[u8] = b"counter";

pub const COUNTER_ACCOUNT_NAME: &str = "Counter";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_program_id_matches_its_base58_form() {
        assert_eq!(
            COUNTER_PROGRAM_ID.to_base58(),
            "BtUk5jpsbzNB2yfR31RXecEHXgcMj4kDabZr3dzKthmW"
        );
    }
}
