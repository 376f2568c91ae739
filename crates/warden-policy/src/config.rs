//! Per-agent policy files.
//!
//! An agents directory holds one file per agent, `<agent_id>.json` or
//! `<agent_id>.toml`. The agent id comes from the file name. Example:
//!
//! ```toml
//! spendCapSol = 0.01
//! allowRecipients = ["agent:beta", "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"]
//! allowPrograms = ["11111111111111111111111111111111"]
//! strategy = "simple_transfer"
//! ```
//!
//! Recipients written as `agent:<id>` refer to another agent whose address
//! is only known once its key has been provisioned; they are resolved when
//! the `Policy` is built.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use warden_contracts::{
    address::Address,
    agent::AgentId,
    error::{WardenError, WardenResult},
    policy::Policy,
};

/// Strategy used when a policy file names none.
pub const DEFAULT_STRATEGY: &str = "simple_transfer";

const AGENT_REF_PREFIX: &str = "agent:";

/// File layout. Field names follow the agent files already in circulation;
/// the `allowed*` / `spendCap` spellings are accepted as aliases.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAgentFile {
    #[serde(alias = "spendCap")]
    spend_cap_sol: Decimal,
    #[serde(alias = "allowedRecipients")]
    allow_recipients: Vec<String>,
    #[serde(alias = "allowedPrograms")]
    allow_programs: Vec<String>,
    #[serde(default)]
    strategy: Option<String>,
}

/// An allow-listed recipient before key provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientRef {
    Address(Address),
    Agent(AgentId),
}

impl RecipientRef {
    fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match raw.strip_prefix(AGENT_REF_PREFIX) {
            Some(id) if !id.is_empty() => Ok(RecipientRef::Agent(AgentId::new(id))),
            Some(_) => Err("empty agent reference".to_string()),
            None => Address::parse(raw)
                .map(RecipientRef::Address)
                .map_err(|e| e.to_string()),
        }
    }
}

/// One agent's validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub id: AgentId,
    pub spend_cap: Decimal,
    pub allow_recipients: Vec<RecipientRef>,
    pub allow_programs: Vec<Address>,
    pub strategy: String,
}

impl AgentSpec {
    /// Parse a JSON policy document for agent `id`.
    pub fn from_json_str(id: &AgentId, s: &str) -> WardenResult<Self> {
        let raw: RawAgentFile = serde_json::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse agent '{id}' JSON: {e}"),
        })?;
        Self::from_raw(id, raw)
    }

    /// Parse a TOML policy document for agent `id`.
    pub fn from_toml_str(id: &AgentId, s: &str) -> WardenResult<Self> {
        let raw: RawAgentFile = toml::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse agent '{id}' TOML: {e}"),
        })?;
        Self::from_raw(id, raw)
    }

    /// Read one agent file. The format follows the extension.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let (id, format) = classify(path).ok_or_else(|| WardenError::Config {
            reason: format!("'{}' is not a .json or .toml agent file", path.display()),
        })?;
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            reason: format!("failed to read agent file '{}': {e}", path.display()),
        })?;
        let parsed = match format {
            Format::Json => Self::from_json_str(&id, &contents),
            Format::Toml => Self::from_toml_str(&id, &contents),
        };
        parsed.map_err(|e| match e {
            WardenError::Config { reason } => WardenError::Config {
                reason: format!("{}: {reason}", path.display()),
            },
            other => other,
        })
    }

    /// Build the runtime `Policy`, resolving `agent:<id>` recipients with
    /// `resolve`. An unknown agent reference is a configuration error.
    pub fn policy(&self, resolve: impl Fn(&AgentId) -> Option<Address>) -> WardenResult<Policy> {
        let recipients = self
            .allow_recipients
            .iter()
            .map(|r| match r {
                RecipientRef::Address(address) => Ok(*address),
                RecipientRef::Agent(other) => resolve(other).ok_or_else(|| WardenError::Config {
                    reason: format!(
                        "agent '{}' allow-lists unknown agent '{other}'",
                        self.id
                    ),
                }),
            })
            .collect::<WardenResult<Vec<_>>>()?;
        Policy::new(self.spend_cap, recipients, self.allow_programs.iter().copied())
    }

    fn from_raw(id: &AgentId, raw: RawAgentFile) -> WardenResult<Self> {
        if raw.spend_cap_sol < Decimal::ZERO {
            return Err(WardenError::Config {
                reason: format!("agent '{id}': spendCapSol must be >= 0, got {}", raw.spend_cap_sol),
            });
        }
        let allow_recipients = raw
            .allow_recipients
            .iter()
            .map(|r| {
                RecipientRef::parse(r).map_err(|e| WardenError::Config {
                    reason: format!("agent '{id}': bad recipient '{r}': {e}"),
                })
            })
            .collect::<WardenResult<Vec<_>>>()?;
        let allow_programs = raw
            .allow_programs
            .iter()
            .map(|p| {
                Address::parse(p).map_err(|e| WardenError::Config {
                    reason: format!("agent '{id}': bad program id '{p}': {e}"),
                })
            })
            .collect::<WardenResult<Vec<_>>>()?;

        Ok(Self {
            id: id.clone(),
            spend_cap: raw.spend_cap_sol,
            allow_recipients,
            allow_programs,
            strategy: raw
                .strategy
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
        })
    }
}

/// Load every agent file in `dir`, sorted by agent id.
///
/// A missing directory yields no agents. Two files for the same id (for
/// example `alpha.json` and `alpha.toml`) are a configuration error.
pub fn load_dir(dir: &Path) -> WardenResult<Vec<AgentSpec>> {
    let mut found: BTreeMap<AgentId, PathBuf> = BTreeMap::new();
    for path in agent_files(dir)? {
        let Some((id, _)) = classify(&path) else {
            continue;
        };
        if let Some(previous) = found.insert(id.clone(), path.clone()) {
            return Err(WardenError::Config {
                reason: format!(
                    "agent '{id}' is defined twice: '{}' and '{}'",
                    previous.display(),
                    path.display()
                ),
            });
        }
    }

    let specs = found
        .values()
        .map(|path| AgentSpec::from_file(path))
        .collect::<WardenResult<Vec<_>>>()?;
    debug!(dir = %dir.display(), count = specs.len(), "loaded agent policies");
    Ok(specs)
}

/// Agent ids with a policy file in `dir`, sorted.
pub fn list_agent_ids(dir: &Path) -> WardenResult<Vec<AgentId>> {
    let mut ids: Vec<AgentId> = agent_files(dir)?
        .iter()
        .filter_map(|p| classify(p).map(|(id, _)| id))
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

enum Format {
    Json,
    Toml,
}

fn classify(path: &Path) -> Option<(AgentId, Format)> {
    let format = match path.extension()?.to_str()? {
        "json" => Format::Json,
        "toml" => Format::Toml,
        _ => return None,
    };
    let stem = path.file_stem()?.to_str()?;
    Some((AgentId::new(stem), format))
}

fn agent_files(dir: &Path) -> WardenResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| WardenError::Config {
        reason: format!("failed to list agents directory '{}': {e}", dir.display()),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WardenError::Config {
            reason: format!("failed to list agents directory '{}': {e}", dir.display()),
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use warden_contracts::address::{MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID};

    use super::*;

    const SYSTEM: &str = "11111111111111111111111111111111";

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    #[test]
    fn json_file_with_camel_case_field_names() {
        let json = format!(
            r#"{{"spendCapSol": 0.01, "allowRecipients": ["agent:beta"], "allowPrograms": ["{SYSTEM}"], "strategy": "treasury"}}"#
        );
        let spec = AgentSpec::from_json_str(&id("alpha"), &json).unwrap();
        assert_eq!(spec.spend_cap, dec!(0.01));
        assert_eq!(spec.allow_recipients, vec![RecipientRef::Agent(id("beta"))]);
        assert_eq!(spec.allow_programs, vec![SYSTEM_PROGRAM_ID]);
        assert_eq!(spec.strategy, "treasury");
    }

    #[test]
    fn toml_file_with_alias_field_names_and_default_strategy() {
        let toml = format!(
            r#"
            spendCap = 0.5
            allowedRecipients = []
            allowedPrograms = ["{SYSTEM}", "{}"]
            "#,
            MEMO_PROGRAM_ID
        );
        let spec = AgentSpec::from_toml_str(&id("alpha"), &toml).unwrap();
        assert_eq!(spec.spend_cap, dec!(0.5));
        assert_eq!(spec.allow_programs, vec![SYSTEM_PROGRAM_ID, MEMO_PROGRAM_ID]);
        assert_eq!(spec.strategy, DEFAULT_STRATEGY);
    }

    #[test]
    fn missing_field_negative_cap_and_bad_address_are_config_errors() {
        let missing = r#"{"spendCapSol": 1, "allowPrograms": []}"#;
        assert!(matches!(
            AgentSpec::from_json_str(&id("a"), missing),
            Err(WardenError::Config { .. })
        ));

        let negative = r#"{"spendCapSol": -1, "allowRecipients": [], "allowPrograms": []}"#;
        let err = AgentSpec::from_json_str(&id("a"), negative).unwrap_err();
        assert!(err.to_string().contains("spendCapSol must be >= 0"));

        let bad = r#"{"spendCapSol": 1, "allowRecipients": ["not-an-address!"], "allowPrograms": []}"#;
        let err = AgentSpec::from_json_str(&id("a"), bad).unwrap_err();
        assert!(err.to_string().contains("not-an-address!"));
    }

    #[test]
    fn policy_resolves_agent_references() {
        let json = r#"{"spendCapSol": 0.01, "allowRecipients": ["agent:beta"], "allowPrograms": []}"#;
        let spec = AgentSpec::from_json_str(&id("alpha"), json).unwrap();
        let beta = Address([9u8; 32]);

        let policy = spec
            .policy(|other| (other.as_str() == "beta").then_some(beta))
            .unwrap();
        assert!(policy.allows_recipient(&beta));

        let err = spec.policy(|_| None).unwrap_err();
        assert!(err.to_string().contains("unknown agent 'beta'"));
    }

    #[test]
    fn load_dir_sorts_by_id_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"spendCapSol": 0.01, "allowRecipients": [], "allowPrograms": []}"#;
        std::fs::write(dir.path().join("zeta.json"), body).unwrap();
        std::fs::write(dir.path().join("alpha.json"), body).unwrap();
        std::fs::write(
            dir.path().join("mid.toml"),
            "spendCapSol = 0.02\nallowRecipients = []\nallowPrograms = []\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();

        let specs = load_dir(dir.path()).unwrap();
        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
        assert_eq!(list_agent_ids(dir.path()).unwrap().len(), 3);
    }

    #[test]
    fn load_dir_rejects_duplicate_ids_and_names_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"spendCapSol": 0.01, "allowRecipients": [], "allowPrograms": []}"#;
        std::fs::write(dir.path().join("alpha.json"), body).unwrap();
        std::fs::write(
            dir.path().join("alpha.toml"),
            "spendCapSol = 0.01\nallowRecipients = []\nallowPrograms = []\n",
        )
        .unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("defined twice"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn missing_dir_has_no_agents() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dir(&dir.path().join("absent")).unwrap().is_empty());
    }
}
