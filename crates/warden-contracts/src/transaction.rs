//! Transactions: instructions, freshness anchors, compiled messages, signatures.
//!
//! A `TransactionPlan` is compiled from an ordered instruction list, a fee
//! payer and a `FreshnessAnchor`. Signing consumes the plan and yields a
//! `SignedTransaction`, the only thing the ledger accepts. A signed
//! transaction is bound to its anchor: retrying after the anchor expires
//! means compiling and signing a new plan.
//!
//! Wire layout (legacy message):
//!   header (3 bytes) | compact-u16 key count | keys (32 bytes each)
//!   | recent blockhash (32 bytes) | compact-u16 instruction count
//!   | per instruction: program index (u8), compact-u16 account count,
//!     account indexes (u8 each), compact-u16 data length, data

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    address::Address,
    error::{WardenError, WardenResult},
};

// ── Instructions ──────────────────────────────────────────────────────────────

/// One account an instruction touches, with its access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: true }
    }

    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: false }
    }
}

/// A single program invocation before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

// ── Freshness anchor ──────────────────────────────────────────────────────────

/// A recent blockhash. Embedding it proves recency and bounds replay.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blockhash(pub [u8; 32]);

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({self})")
    }
}

impl Serialize for Blockhash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Blockhash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = bs58::decode(&raw).into_vec().map_err(serde::de::Error::custom)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("blockhash must decode to 32 bytes"))?;
        Ok(Blockhash(array))
    }
}

/// A blockhash plus the last block height at which it is still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessAnchor {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

// ── Signatures ────────────────────────────────────────────────────────────────

/// A 64-byte ed25519 signature. Its base58 form doubles as the transaction id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Anything that can sign a message on behalf of one address.
///
/// Key custody implements this for decrypted key material. The engine only
/// ever sees this seam, never raw key bytes.
pub trait Signer: Send + Sync {
    /// The address whose key produces the signatures.
    fn address(&self) -> Address;

    /// Sign `message` with the key behind `address()`.
    fn sign_message(&self, message: &[u8]) -> Signature;
}

// ── Compiled message ──────────────────────────────────────────────────────────

/// Counts that tell the ledger which keys must sign and which are writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction whose addresses have been replaced by key indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` with `fee_payer` as the first signer.
    ///
    /// Keys are ordered: fee payer, writable signers, readonly signers,
    /// writable non-signers, readonly non-signers; first appearance breaks
    /// ties. Flags for a key used more than once are merged.
    pub fn compile(
        fee_payer: Address,
        instructions: &[Instruction],
        recent_blockhash: Blockhash,
    ) -> WardenResult<Self> {
        let mut keys: Vec<(Address, bool, bool)> = vec![(fee_payer, true, true)];
        let mut upsert = |address: Address, signer: bool, writable: bool| {
            match keys.iter_mut().find(|(k, _, _)| *k == address) {
                Some(entry) => {
                    entry.1 |= signer;
                    entry.2 |= writable;
                }
                None => keys.push((address, signer, writable)),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.address, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let (payer, rest) = keys.split_at(1);
        let class = |signer: bool, writable: bool| -> Vec<(Address, bool, bool)> {
            rest.iter()
                .copied()
                .filter(|(_, s, w)| *s == signer && *w == writable)
                .collect()
        };
        let mut ordered: Vec<(Address, bool, bool)> = payer.to_vec();
        ordered.extend(class(true, true));
        ordered.extend(class(true, false));
        ordered.extend(class(false, true));
        ordered.extend(class(false, false));

        if ordered.len() > usize::from(u8::MAX) + 1 {
            return Err(WardenError::InvalidIntent {
                reason: format!("transaction references {} accounts, limit is 256", ordered.len()),
            });
        }

        let count = |pred: &dyn Fn(&(Address, bool, bool)) -> bool| -> u8 {
            ordered.iter().filter(|k| pred(k)).count() as u8
        };
        let header = MessageHeader {
            num_required_signatures: count(&|(_, s, _)| *s),
            num_readonly_signed_accounts: count(&|(_, s, w)| *s && !*w),
            num_readonly_unsigned_accounts: count(&|(_, s, w)| !*s && !*w),
        };
        let account_keys: Vec<Address> = ordered.iter().map(|(k, _, _)| *k).collect();

        let index_of = |address: &Address| -> u8 {
            // Every address was inserted above, and the key count fits in u8.
            account_keys.iter().position(|k| k == address).unwrap_or(0) as u8
        };
        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.address)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The fee payer is always the first key.
    pub fn fee_payer(&self) -> Option<&Address> {
        self.account_keys.first()
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signers = usize::from(self.header.num_required_signatures);
        let readonly_signed = usize::from(self.header.num_readonly_signed_accounts);
        let readonly_unsigned = usize::from(self.header.num_readonly_unsigned_accounts);
        if index < signers {
            index < signers - readonly_signed
        } else {
            index < self.account_keys.len() - readonly_unsigned
        }
    }

    /// Rebuild the address-level view of a compiled instruction.
    pub fn resolve(&self, ix: &CompiledInstruction) -> Option<Instruction> {
        let program_id = *self.account_keys.get(usize::from(ix.program_id_index))?;
        let accounts = ix
            .accounts
            .iter()
            .map(|&i| {
                let index = usize::from(i);
                self.account_keys.get(index).map(|address| AccountMeta {
                    address: *address,
                    is_signer: self.is_signer(index),
                    is_writable: self.is_writable(index),
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Instruction {
            program_id,
            accounts,
            data: ix.data.clone(),
        })
    }

    /// Program ids referenced by this message, in instruction order.
    pub fn program_ids(&self) -> Vec<Address> {
        self.instructions
            .iter()
            .filter_map(|ix| self.account_keys.get(usize::from(ix.program_id_index)).copied())
            .collect()
    }

    /// Serialize to the bytes that are signed.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);
        write_compact_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash.0);
        write_compact_len(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            write_compact_len(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            write_compact_len(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

/// Append `len` in the ledger's compact-u16 varint encoding.
///
/// Lengths above `u16::MAX` cannot occur in a transaction that fits the
/// ledger's packet size; they are clamped rather than wrapped.
fn write_compact_len(out: &mut Vec<u8>, len: usize) {
    let mut value = u16::try_from(len).unwrap_or(u16::MAX);
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

// ── Plans ─────────────────────────────────────────────────────────────────────

/// A compiled, not-yet-signed transaction.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    message: Message,
    anchor: FreshnessAnchor,
}

impl TransactionPlan {
    /// Compile `instructions` against `anchor` with `fee_payer` paying.
    pub fn compile(
        fee_payer: Address,
        instructions: &[Instruction],
        anchor: FreshnessAnchor,
    ) -> WardenResult<Self> {
        let message = Message::compile(fee_payer, instructions, anchor.blockhash)?;
        Ok(Self { message, anchor })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn anchor(&self) -> &FreshnessAnchor {
        &self.anchor
    }

    /// Sign the whole message, consuming the plan.
    ///
    /// The signer must be the message's only required signer; anything else
    /// means the plan was compiled for a different agent.
    pub fn sign(self, signer: &dyn Signer) -> WardenResult<SignedTransaction> {
        let signer_address = signer.address();
        let required = usize::from(self.message.header.num_required_signatures);
        if required != 1 || self.message.fee_payer() != Some(&signer_address) {
            return Err(WardenError::Wiring {
                reason: format!(
                    "plan requires {required} signer(s) with fee payer {:?}, but signer is {signer_address}",
                    self.message.fee_payer()
                ),
            });
        }
        let signature = signer.sign_message(&self.message.serialize());
        Ok(SignedTransaction {
            message: self.message,
            signatures: vec![signature],
            anchor: self.anchor,
        })
    }
}

/// A signed transaction bound to the anchor it was compiled against.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    message: Message,
    signatures: Vec<Signature>,
    anchor: FreshnessAnchor,
}

impl SignedTransaction {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn anchor(&self) -> &FreshnessAnchor {
        &self.anchor
    }

    /// The transaction id: the fee payer's signature in base58.
    pub fn id(&self) -> String {
        self.signatures
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Full wire encoding: signatures followed by the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_compact_len(&mut out, self.signatures.len());
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&self.message.serialize());
        out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
