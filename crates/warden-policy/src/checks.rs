//! The three guardrail checks.
//!
//! Each check is a pure function of a `Policy` and the value under test. A
//! check either passes or returns the `PolicyViolation` naming the offending
//! value; it never corrects the input.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use warden_contracts::{address::Address, error::PolicyViolation, policy::Policy};

/// A recipient or program id as a caller supplied it.
///
/// Encoded forms are normalized before comparison, so base58 with stray
/// whitespace, hex, and an already decoded `Address` all compare equal.
#[derive(Debug, Clone, Copy)]
pub enum Principal<'a> {
    Encoded(&'a str),
    Decoded(Address),
}

impl Principal<'_> {
    /// Canonical form, or the raw input if it cannot be decoded.
    pub fn normalize(&self) -> Result<Address, String> {
        match self {
            Principal::Decoded(address) => Ok(*address),
            Principal::Encoded(raw) => Address::parse(raw).map_err(|_| raw.to_string()),
        }
    }
}

impl<'a> From<&'a str> for Principal<'a> {
    fn from(s: &'a str) -> Self {
        Principal::Encoded(s)
    }
}

impl<'a> From<&'a String> for Principal<'a> {
    fn from(s: &'a String) -> Self {
        Principal::Encoded(s)
    }
}

impl From<Address> for Principal<'_> {
    fn from(address: Address) -> Self {
        Principal::Decoded(address)
    }
}

impl From<&Address> for Principal<'_> {
    fn from(address: &Address) -> Self {
        Principal::Decoded(*address)
    }
}

/// Canonical base58 form of any accepted principal encoding.
///
/// Idempotent: normalizing the output again returns it unchanged.
pub fn normalize<'a>(principal: impl Into<Principal<'a>>) -> Option<String> {
    principal.into().normalize().ok().map(|a| a.to_base58())
}

/// Pass iff `amount <= spend_cap`.
pub fn check_spend_cap(policy: &Policy, amount: Decimal) -> Result<(), PolicyViolation> {
    if amount > policy.spend_cap() {
        warn!(%amount, cap = %policy.spend_cap(), "spend cap exceeded");
        return Err(PolicyViolation::SpendCapExceeded {
            amount,
            cap: policy.spend_cap(),
        });
    }
    debug!(%amount, cap = %policy.spend_cap(), "spend cap ok");
    Ok(())
}

/// Pass iff the normalized recipient is allow-listed.
///
/// An undecodable recipient is rejected with its raw text.
pub fn check_recipient<'a>(
    policy: &Policy,
    recipient: impl Into<Principal<'a>>,
) -> Result<(), PolicyViolation> {
    match recipient.into().normalize() {
        Ok(address) if policy.allows_recipient(&address) => {
            debug!(recipient = %address, "recipient allowed");
            Ok(())
        }
        Ok(address) => {
            warn!(recipient = %address, "recipient not allow-listed");
            Err(PolicyViolation::RecipientNotAllowed {
                recipient: address.to_base58(),
            })
        }
        Err(raw) => {
            warn!(recipient = %raw, "recipient could not be decoded");
            Err(PolicyViolation::RecipientNotAllowed { recipient: raw })
        }
    }
}

/// Pass iff every program id is allow-listed.
///
/// All ids are evaluated and every rejection is logged; the first rejection
/// in input order is returned.
pub fn check_programs<'a, I, P>(policy: &Policy, program_ids: I) -> Result<(), PolicyViolation>
where
    I: IntoIterator<Item = P>,
    P: Into<Principal<'a>>,
{
    let mut first: Option<PolicyViolation> = None;
    for program in program_ids {
        let rejected = match program.into().normalize() {
            Ok(address) if policy.allows_program(&address) => None,
            Ok(address) => Some(address.to_base58()),
            Err(raw) => Some(raw),
        };
        if let Some(program) = rejected {
            warn!(%program, "program not allow-listed");
            first.get_or_insert(PolicyViolation::ProgramNotAllowed { program });
        }
    }
    match first {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}
