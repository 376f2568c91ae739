//! Per-agent declarative policy.
//!
//! A `Policy` limits how much an agent may move in one transaction, to whom,
//! and through which programs. It is immutable for the duration of an
//! execution. WARDEN is deny-by-default: an empty allow-list allows nothing.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    address::Address,
    error::{WardenError, WardenResult},
};

/// Guardrails for one agent.
///
/// Construct through `Policy::new`, which enforces `spend_cap >= 0`. The
/// allow-lists hold canonical `Address` values, so membership tests are
/// independent of the encoding the addresses were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    spend_cap: Decimal,
    allowed_recipients: BTreeSet<Address>,
    allowed_programs: BTreeSet<Address>,
}

impl Policy {
    /// Build a policy, rejecting a negative spend cap.
    pub fn new(
        spend_cap: Decimal,
        allowed_recipients: impl IntoIterator<Item = Address>,
        allowed_programs: impl IntoIterator<Item = Address>,
    ) -> WardenResult<Self> {
        if spend_cap < Decimal::ZERO {
            return Err(WardenError::Config {
                reason: format!("spend cap must be >= 0, got {spend_cap}"),
            });
        }
        Ok(Self {
            spend_cap,
            allowed_recipients: allowed_recipients.into_iter().collect(),
            allowed_programs: allowed_programs.into_iter().collect(),
        })
    }

    /// Maximum SOL per transaction, inclusive.
    pub fn spend_cap(&self) -> Decimal {
        self.spend_cap
    }

    pub fn allowed_recipients(&self) -> &BTreeSet<Address> {
        &self.allowed_recipients
    }

    pub fn allowed_programs(&self) -> &BTreeSet<Address> {
        &self.allowed_programs
    }

    pub fn allows_recipient(&self, recipient: &Address) -> bool {
        self.allowed_recipients.contains(recipient)
    }

    pub fn allows_program(&self, program: &Address) -> bool {
        self.allowed_programs.contains(program)
    }
}
