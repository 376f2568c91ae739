//! In-memory signing keys.

use std::fmt;

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use warden_contracts::{
    address::Address,
    transaction::{Signature, Signer},
};
use zeroize::Zeroizing;

/// Length of the serialized keypair: 32-byte seed followed by the 32-byte
/// public key, the layout agent key files have always used.
pub const KEYPAIR_LEN: usize = 64;

/// An agent's decrypted ed25519 key.
///
/// Never cloned, never serialized except through `seal`. The underlying
/// `SigningKey` zeroizes itself on drop.
pub struct KeyMaterial {
    signing: SigningKey,
    address: Address,
}

impl KeyMaterial {
    /// Generate a fresh key from the operating system's CSPRNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Rebuild a key from its 64-byte `seed || public` form.
    ///
    /// Returns `None` when the public half does not match the seed.
    pub fn from_keypair_bytes(bytes: &[u8; KEYPAIR_LEN]) -> Option<Self> {
        SigningKey::from_keypair_bytes(bytes)
            .ok()
            .map(Self::from_signing_key)
    }

    /// The 64-byte `seed || public` form. Wiped when the returned buffer drops.
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        Zeroizing::new(self.signing.to_keypair_bytes())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let address = Address(signing.verifying_key().to_bytes());
        Self { signing, address }
    }
}

impl Signer for KeyMaterial {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
