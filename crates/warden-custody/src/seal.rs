//! Passphrase-based sealing of key material.
//!
//! scrypt (N = 2^14, r = 8, p = 1) stretches the passphrase with a fresh
//! 16-byte salt into a 32-byte AES-256-GCM key; a fresh 12-byte nonce
//! encrypts the 64-byte keypair. The GCM tag is stored apart from the
//! ciphertext. These parameters match the key files agents already have on
//! disk and must not change without a migration.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use scrypt::{scrypt, Params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_contracts::error::{WardenError, WardenResult};
use zeroize::Zeroizing;

use crate::{
    key::{KeyMaterial, KEYPAIR_LEN},
    passphrase::Passphrase,
};

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// On-disk form of one sealed key. Every field is lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyRecord {
    pub salt: String,
    pub iv: String,
    pub tag: String,
    pub enc: String,
}

/// Encrypt `material` under `passphrase` with a fresh salt and nonce.
pub fn seal(material: &KeyMaterial, passphrase: &Passphrase) -> WardenResult<EncryptedKeyRecord> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt).ok_or_else(|| WardenError::KeyStore {
        reason: "key derivation failed".to_string(),
    })?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref()).map_err(|e| WardenError::KeyStore {
        reason: format!("cipher init failed: {e}"),
    })?;

    let plaintext = material.to_keypair_bytes();
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_ref())
        .map_err(|_| WardenError::KeyStore {
            reason: "encryption failed".to_string(),
        })?;
    let tag = sealed.split_off(sealed.len().saturating_sub(TAG_LEN));

    debug!(address = %material.address(), "sealed key material");
    Ok(EncryptedKeyRecord {
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        tag: hex::encode(tag),
        enc: hex::encode(sealed),
    })
}

/// Decrypt a record. Fails closed with `WardenError::Decryption` on any
/// problem, without saying which.
pub fn open(record: &EncryptedKeyRecord, passphrase: &Passphrase) -> WardenResult<KeyMaterial> {
    let salt = decode_field(&record.salt, SALT_LEN)?;
    let iv = decode_field(&record.iv, NONCE_LEN)?;
    let tag = decode_field(&record.tag, TAG_LEN)?;
    let mut combined = decode_field(&record.enc, KEYPAIR_LEN)?;
    combined.extend_from_slice(&tag);

    let key = derive_key(passphrase, &salt).ok_or(WardenError::Decryption)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref()).map_err(|_| WardenError::Decryption)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&iv), combined.as_ref())
            .map_err(|_| WardenError::Decryption)?,
    );

    let mut keypair = Zeroizing::new([0u8; KEYPAIR_LEN]);
    if plaintext.len() != KEYPAIR_LEN {
        return Err(WardenError::Decryption);
    }
    keypair.copy_from_slice(&plaintext);
    KeyMaterial::from_keypair_bytes(&keypair).ok_or(WardenError::Decryption)
}

fn derive_key(passphrase: &Passphrase, salt: &[u8]) -> Option<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).ok()?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(passphrase.expose().as_bytes(), salt, &params, key.as_mut()).ok()?;
    Some(key)
}

fn decode_field(field: &str, expected_len: usize) -> WardenResult<Vec<u8>> {
    match hex::decode(field.trim()) {
        Ok(bytes) if bytes.len() == expected_len => Ok(bytes),
        _ => Err(WardenError::Decryption),
    }
}
