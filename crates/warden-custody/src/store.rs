//! Directory-backed key store: one `<agent_id>.json` record per agent.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use warden_contracts::{
    agent::AgentId,
    error::{WardenError, WardenResult},
};

use crate::{
    key::KeyMaterial,
    passphrase::Passphrase,
    seal::{open, seal, EncryptedKeyRecord},
};

/// Persistent custody of sealed agent keys.
///
/// Records are never overwritten. `create` publishes a fully written
/// temporary file under the final name with a no-clobber link, so two
/// concurrent creates for the same agent cannot both succeed and a reader
/// never sees a partial record.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// A store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self, agent_id: &AgentId) -> WardenResult<bool> {
        Ok(self.record_path(agent_id)?.exists())
    }

    /// Generate, seal and persist a new key for `agent_id`.
    ///
    /// Fails with `WardenError::KeyExists` if a record is already present.
    pub fn create(&self, agent_id: &AgentId, passphrase: &Passphrase) -> WardenResult<KeyMaterial> {
        let path = self.record_path(agent_id)?;
        if path.exists() {
            return Err(WardenError::KeyExists {
                agent_id: agent_id.to_string(),
            });
        }

        let material = KeyMaterial::generate();
        let record = seal(&material, passphrase)?;
        let json = serde_json::to_vec_pretty(&record).map_err(|e| WardenError::KeyStore {
            reason: format!("failed to encode key record: {e}"),
        })?;

        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        // NamedTempFile is created 0600 on Unix; the link keeps that mode.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        tmp.write_all(&json).map_err(|e| io_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                info!(agent_id = %agent_id, address = %material.address(), "created agent key");
                Ok(material)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Err(WardenError::KeyExists {
                agent_id: agent_id.to_string(),
            }),
            Err(e) => Err(io_error(&path, e.error)),
        }
    }

    /// Read and decrypt the record for `agent_id`.
    pub fn load(&self, agent_id: &AgentId, passphrase: &Passphrase) -> WardenResult<KeyMaterial> {
        let path = self.record_path(agent_id)?;
        let raw = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => WardenError::KeyStore {
                reason: format!("no key record for agent '{agent_id}'"),
            },
            _ => io_error(&path, e),
        })?;
        // A record that is not even valid JSON is as unusable as one that
        // fails authentication.
        let record: EncryptedKeyRecord =
            serde_json::from_slice(&raw).map_err(|_| WardenError::Decryption)?;
        let material = open(&record, passphrase)?;
        debug!(agent_id = %agent_id, address = %material.address(), "loaded agent key");
        Ok(material)
    }

    /// Load the key for `agent_id`, creating it if absent.
    ///
    /// Returns the key and whether it was created by this call. Losing a
    /// creation race to another process falls back to loading its record.
    pub fn load_or_create(
        &self,
        agent_id: &AgentId,
        passphrase: &Passphrase,
    ) -> WardenResult<(KeyMaterial, bool)> {
        if self.exists(agent_id)? {
            return Ok((self.load(agent_id, passphrase)?, false));
        }
        match self.create(agent_id, passphrase) {
            Ok(material) => Ok((material, true)),
            Err(WardenError::KeyExists { .. }) => Ok((self.load(agent_id, passphrase)?, false)),
            Err(e) => Err(e),
        }
    }

    fn record_path(&self, agent_id: &AgentId) -> WardenResult<PathBuf> {
        validate_agent_id(agent_id)?;
        Ok(self.dir.join(format!("{agent_id}.json")))
    }
}

/// Agent ids become file names, so they are restricted to a safe alphabet.
fn validate_agent_id(agent_id: &AgentId) -> WardenResult<()> {
    let id = agent_id.as_str();
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(WardenError::KeyStore {
            reason: format!("invalid agent id '{id}': use letters, digits, '_', '-' or '.'"),
        })
    }
}

fn io_error(path: &Path, e: std::io::Error) -> WardenError {
    WardenError::KeyStore {
        reason: format!("{}: {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
