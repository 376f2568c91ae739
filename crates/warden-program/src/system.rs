//! System transfer and memo instructions.

use warden_contracts::{
    address::{Address, MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID},
    transaction::{AccountMeta, Instruction},
};

/// System program instruction index for `Transfer`.
pub const TRANSFER_INDEX: u32 = 2;

/// Move `lamports` from `from` (which signs) to `to`.
///
/// Data layout: `u32` LE instruction index, then `u64` LE lamports.
pub fn transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(*from, true), AccountMeta::writable(*to, false)],
        data,
    }
}

/// Parse transfer instruction data back into lamports.
pub fn decode_transfer(data: &[u8]) -> Option<u64> {
    let (index, rest) = data.split_first_chunk::<4>()?;
    if u32::from_le_bytes(*index) != TRANSFER_INDEX || rest.len() != 8 {
        return None;
    }
    let lamports: [u8; 8] = rest.try_into().ok()?;
    Some(u64::from_le_bytes(lamports))
}

/// Attach `text` to the transaction. The memo references no accounts.
pub fn memo(text: &str) -> Instruction {
    Instruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: Vec::new(),
        data: text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_layout() {
        let from = Address([1u8; 32]);
        let to = Address([2u8; 32]);
        let ix = transfer(&from, &to, 1_000_000);

        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_000_000u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
        assert_eq!(decode_transfer(&ix.data), Some(1_000_000));
    }

    #[test]
    fn decode_rejects_other_instructions() {
        assert_eq!(decode_transfer(&[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(decode_transfer(&[2, 0, 0]), None);
    }

    #[test]
    fn memo_is_raw_utf8() {
        let ix = memo("paying 0.001 SOL");
        assert_eq!(ix.program_id, MEMO_PROGRAM_ID);
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data, b"paying 0.001 SOL");
    }
}
