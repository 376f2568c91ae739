//! Conversions between decimal SOL amounts and integer lamports.
//!
//! Policies and intents speak in decimal SOL; the ledger only understands
//! lamports. Conversion happens once, at compile time, and rounds half away
//! from zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{WardenError, WardenResult};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert a positive SOL amount to lamports.
///
/// Returns `WardenError::InvalidIntent` for zero, negative, or out-of-range
/// amounts and for amounts that round to zero lamports.
pub fn sol_to_lamports(amount: Decimal) -> WardenResult<u64> {
    if amount <= Decimal::ZERO {
        return Err(WardenError::InvalidIntent {
            reason: format!("amount must be positive, got {amount}"),
        });
    }
    let lamports = amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_u64())
        .ok_or_else(|| WardenError::InvalidIntent {
            reason: format!("amount {amount} does not fit in lamports"),
        })?;
    if lamports == 0 {
        return Err(WardenError::InvalidIntent {
            reason: format!("amount {amount} is below one lamport"),
        });
    }
    Ok(lamports)
}

/// Exact decimal SOL value of a lamport balance.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), 9).normalize()
}
