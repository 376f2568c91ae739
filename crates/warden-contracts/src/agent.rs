//! Agent identity and observed state.
//!
//! These types identify who is acting and what the runtime saw before the
//! agent's strategy decided. WARDEN does not prescribe strategy internals.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Stable, human-readable identifier for an agent.
///
/// Used as the key-store record name, in policy files, and in every audit
/// event. Example: `AgentId("treasury")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a single intent execution.
///
/// Every call to `ExecutionEngine::execute()` runs under one of these; it
/// appears in every log line and audit event the execution produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    /// Create a new, unique execution ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the runtime observed about an agent right before it decides.
///
/// Handed to `DecisionStrategy::decide()`. `balance` is the spendable
/// balance in SOL; `lamports` is the same value in base units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedState {
    pub agent_id: AgentId,
    pub address: Address,
    pub balance: Decimal,
    pub lamports: u64,
}
