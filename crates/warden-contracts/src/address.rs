//! Ledger addresses and their canonical string form.
//!
//! Every principal the runtime compares (recipients, program ids, fee payers)
//! is an `Address`: 32 raw bytes whose canonical textual form is base58.
//! Parsing accepts the encodings operators actually paste into config files
//! and always yields the same canonical value, so allow-list membership never
//! depends on how an address was supplied.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The system program: owner of plain wallets, executor of value transfers.
pub const SYSTEM_PROGRAM_ID: Address = Address([0u8; 32]);

/// The memo program (`MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr`).
pub const MEMO_PROGRAM_ID: Address = Address([
    5, 74, 83, 90, 153, 41, 33, 6, 77, 36, 232, 113, 96, 218, 56, 124, 124, 53, 181, 221, 188,
    146, 187, 129, 228, 31, 168, 64, 65, 5, 68, 141,
]);

/// Why a string could not be read as an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address '{0}' is neither base58 nor 32-byte hex")]
    InvalidEncoding(String),

    #[error("address decodes to {0} bytes, expected 32")]
    InvalidLength(usize),
}

/// A 32-byte ledger address (public key or program-derived address).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Byte length of every address.
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build an address from a byte slice of exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Parse any accepted textual form into the canonical address.
    ///
    /// Accepted forms:
    /// - base58 (the canonical form), surrounding whitespace ignored
    /// - 64 hex characters in any case, with or without a `0x` prefix
    ///
    /// A base58 encoding of 32 bytes is at most 44 characters, so a 64
    /// character hex string is never ambiguous.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let hex_body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_body.len() == 64 && hex_body.bytes().all(|b| b.is_ascii_hexdigit()) {
            let bytes = hex::decode(hex_body)
                .map_err(|_| AddressError::InvalidEncoding(trimmed.to_string()))?;
            return Self::try_from_slice(&bytes);
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding(trimmed.to_string()))?;
        Self::try_from_slice(&bytes)
    }

    /// The canonical base58 form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}
