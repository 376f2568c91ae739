//! Program-derived addresses.
//!
//! A PDA is `sha256(seeds.. || [bump] || program_id || "ProgramDerivedAddress")`
//! for the highest bump in 255..=0 whose hash is not a valid ed25519 point,
//! so no private key can ever sign for it.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};
use warden_contracts::address::Address;

pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Hash `seeds` under `program_id`. `None` if the seeds are out of bounds or
/// the result lies on the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Option<Address> {
    if seeds.len() > MAX_SEEDS || seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
        return None;
    }
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let hash: [u8; 32] = hasher.finalize().into();
    if is_on_curve(&hash) {
        return None;
    }
    Some(Address(hash))
}

/// The canonical PDA for `seeds` and its bump.
///
/// Deterministic: the same inputs always produce the same pair.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Option<(Address, u8)> {
    if seeds.len() >= MAX_SEEDS {
        return None;
    }
    (0..=u8::MAX).rev().find_map(|bump| {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        create_program_address(&with_bump, program_id).map(|address| (address, bump))
    })
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}
