//! Runtime configuration.
//!
//! Every path and knob the runtime needs is a field here and is passed to
//! constructors explicitly; nothing reads the current directory on its own.
//!
//! ```toml
//! keys_dir = "keys"
//! agents_dir = "agents"
//! logs_dir = "logs"
//! passphrase_env = "WARDEN_KEY_PASSPHRASE"
//! simulate_only = false
//! commitment = "confirmed"
//! confirm_timeout_secs = 30
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use warden_contracts::{
    error::{WardenError, WardenResult},
    ledger::Commitment,
};
use warden_custody::{Passphrase, DEFAULT_PASSPHRASE_ENV};

const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 30;

/// Knobs the execution engine reads on every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Stop after a successful dry run; never broadcast.
    pub simulate_only: bool,
    pub commitment: Commitment,
    /// Upper bound on waiting for confirmation after broadcast.
    pub confirm_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulate_only: false,
            commitment: Commitment::default(),
            confirm_timeout: Duration::from_secs(DEFAULT_CONFIRM_TIMEOUT_SECS),
        }
    }
}

/// The whole runtime's configuration, usually loaded from `warden.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub keys_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Optional IDL file for the counter program; the embedded copy is used
    /// when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idl_path: Option<PathBuf>,
    pub passphrase_env: String,
    pub simulate_only: bool,
    pub commitment: Commitment,
    pub confirm_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("keys"),
            agents_dir: PathBuf::from("agents"),
            logs_dir: PathBuf::from("logs"),
            idl_path: None,
            passphrase_env: DEFAULT_PASSPHRASE_ENV.to_string(),
            simulate_only: false,
            commitment: Commitment::default(),
            confirm_timeout_secs: DEFAULT_CONFIRM_TIMEOUT_SECS,
        }
    }
}

impl RuntimeConfig {
    /// Parse `s` as TOML. Unset keys take their defaults.
    ///
    /// Returns `WardenError::Config` if the TOML is malformed, has unknown
    /// keys, or sets an invalid value.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse runtime TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            simulate_only: self.simulate_only,
            commitment: self.commitment,
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
        }
    }

    /// Read the key passphrase from the configured environment variable.
    pub fn passphrase(&self) -> WardenResult<Passphrase> {
        Passphrase::from_env(&self.passphrase_env)
    }

    fn validate(&self) -> WardenResult<()> {
        if self.confirm_timeout_secs == 0 {
            return Err(WardenError::Config {
                reason: "confirm_timeout_secs must be at least 1".to_string(),
            });
        }
        if self.passphrase_env.trim().is_empty() {
            return Err(WardenError::Config {
                reason: "passphrase_env must name an environment variable".to_string(),
            });
        }
        Ok(())
    }
}
