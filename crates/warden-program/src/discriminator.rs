//! 8-byte Anchor discriminators.

use sha2::{Digest, Sha256};

pub const DISCRIMINATOR_LEN: usize = 8;

/// Prefix of instruction data: `sha256("global:<name>")[..8]`.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    truncated_hash("global", name)
}

/// Prefix of account data: `sha256("account:<TypeName>")[..8]`.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    truncated_hash("account", name)
}

fn truncated_hash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update(b":")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}
