use std::fmt;

use warden_contracts::error::{WardenError, WardenResult};
use zeroize::Zeroizing;

/// Environment variable consulted when no other name is configured.
pub const DEFAULT_PASSPHRASE_ENV: &str = "WARDEN_KEY_PASSPHRASE";

/// The secret that unlocks every key record in a store.
///
/// Read once at startup and wiped on drop. `Debug` never prints it.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    /// Wrap a passphrase, rejecting the empty string.
    pub fn new(value: impl Into<String>) -> WardenResult<Self> {
        let value = Zeroizing::new(value.into());
        if value.is_empty() {
            return Err(WardenError::Config {
                reason: "key passphrase must not be empty".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Read the passphrase from environment variable `var`.
    pub fn from_env(var: &str) -> WardenResult<Self> {
        match std::env::var(var) {
            Ok(value) => Self::new(value).map_err(|_| WardenError::Config {
                reason: format!("environment variable {var} is empty"),
            }),
            Err(_) => Err(WardenError::Config {
                reason: format!("set the {var} environment variable to unlock agent keys"),
            }),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_passphrase_is_a_config_error() {
        assert!(matches!(Passphrase::new(""), Err(WardenError::Config { .. })));
    }

    #[test]
    fn missing_env_var_names_the_variable() {
        let err = Passphrase::from_env("WARDEN_TEST_PASSPHRASE_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("WARDEN_TEST_PASSPHRASE_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn debug_is_redacted() {
        let p = Passphrase::new("hunter2").unwrap();
        assert_eq!(format!("{p:?}"), "Passphrase(***)");
        assert_eq!(p.expose(), "hunter2");
    }
}
