//! # warden-custody
//!
//! Encrypted key custody for WARDEN agents.
//!
//! Each agent owns exactly one ed25519 key. At rest the key is sealed with a
//! passphrase-derived AES-256-GCM key and stored as `<agent_id>.json` in the
//! key directory. In memory it lives only inside `KeyMaterial`, which the
//! engine uses through the `Signer` trait and never sees as bytes.

pub mod key;
pub mod passphrase;
pub mod seal;
pub mod store;

pub use key::KeyMaterial;
pub use passphrase::{Passphrase, DEFAULT_PASSPHRASE_ENV};
pub use seal::{open, seal, EncryptedKeyRecord};
pub use store::KeyStore;
