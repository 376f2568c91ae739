//! What an execution produced.
//!
//! `ExecutionOutcome` is returned to the caller of `execute()` and
//! `run_cycle()`. Each variant says exactly how far the pipeline got, so
//! callers never have to infer "dry run" from a missing signature.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    agent::{AgentId, ExecutionId},
};

/// Which counter program instruction an execution used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterAction {
    Initialize,
    Increment,
}

impl CounterAction {
    /// The instruction name as it appears in the program's IDL.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterAction::Initialize => "initialize",
            CounterAction::Increment => "increment",
        }
    }
}

impl fmt::Display for CounterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific detail of a compiled intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDetails {
    Transfer {
        to: Address,
        lamports: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
    /// `before` / `after` are `None` when the count could not be read.
    Counter {
        action: CounterAction,
        counter: Address,
        before: Option<u64>,
        after: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The intent was a no-op. Nothing was compiled.
    Skipped {
        execution_id: ExecutionId,
        agent_id: AgentId,
        reason: Option<String>,
    },

    /// The dry run succeeded and the engine is in simulate-only mode.
    Simulated {
        execution_id: ExecutionId,
        agent_id: AgentId,
        details: OutcomeDetails,
        logs: Vec<String>,
    },

    /// Broadcast and confirmed.
    Committed {
        execution_id: ExecutionId,
        agent_id: AgentId,
        signature: String,
        details: OutcomeDetails,
    },
}

impl ExecutionOutcome {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionOutcome::Skipped { execution_id, .. }
            | ExecutionOutcome::Simulated { execution_id, .. }
            | ExecutionOutcome::Committed { execution_id, .. } => *execution_id,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            ExecutionOutcome::Skipped { agent_id, .. }
            | ExecutionOutcome::Simulated { agent_id, .. }
            | ExecutionOutcome::Committed { agent_id, .. } => agent_id,
        }
    }

    /// The transaction signature, present only once committed.
    pub fn signature(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Committed { signature, .. } => Some(signature),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&OutcomeDetails> {
        match self {
            ExecutionOutcome::Skipped { .. } => None,
            ExecutionOutcome::Simulated { details, .. }
            | ExecutionOutcome::Committed { details, .. } => Some(details),
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, ExecutionOutcome::Committed { .. })
    }
}
