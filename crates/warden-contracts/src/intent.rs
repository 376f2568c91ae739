//! Intents: what an agent's strategy wants to happen.
//!
//! An `Intent` is produced fresh on every decision cycle and is immutable
//! once produced. It is abstract: it names a recipient and an amount, never
//! instructions or accounts. The execution engine compiles it into a
//! transaction only after every applicable policy check has passed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{address::Address, agent::AgentId};

/// A not-yet-validated description of a desired action.
///
/// The set of kinds is closed; the engine matches exhaustively so adding a
/// kind is a compile error until every stage handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Move `amount` SOL from the agent to `to`, optionally annotated with a memo.
    TransferValue {
        agent_id: AgentId,
        to: Address,
        amount: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Initialize or increment the agent's own counter account.
    InvokeCounterProgram {
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Do nothing this cycle.
    NoOp {
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Intent {
    /// The agent this intent was produced for.
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Intent::TransferValue { agent_id, .. }
            | Intent::InvokeCounterProgram { agent_id, .. }
            | Intent::NoOp { agent_id, .. } => agent_id,
        }
    }

    /// The strategy's stated reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Intent::TransferValue { reason, .. }
            | Intent::InvokeCounterProgram { reason, .. }
            | Intent::NoOp { reason, .. } => reason.as_deref(),
        }
    }

    /// Stable discriminant used in logs, audit events and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::TransferValue { .. } => "transfer_value",
            Intent::InvokeCounterProgram { .. } => "invoke_counter_program",
            Intent::NoOp { .. } => "no_op",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::address::MEMO_PROGRAM_ID;

    #[test]
    fn transfer_serializes_with_kind_tag() {
        let intent = Intent::TransferValue {
            agent_id: AgentId::new("alpha"),
            to: MEMO_PROGRAM_ID,
            amount: dec!(0.001),
            memo: Some("hi".to_string()),
            reason: None,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["kind"], "transfer_value");
        assert_eq!(json["agent_id"], "alpha");
        assert!(json.get("reason").is_none());

        let back: Intent = serde_json::from_value(json).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn accessors_cover_every_kind() {
        let noop = Intent::NoOp {
            agent_id: AgentId::new("beta"),
            reason: Some("balance low".to_string()),
        };
        assert_eq!(noop.kind(), "no_op");
        assert_eq!(noop.agent_id().as_str(), "beta");
        assert_eq!(noop.reason(), Some("balance low"));

        let counter = Intent::InvokeCounterProgram {
            agent_id: AgentId::new("gamma"),
            reason: None,
        };
        assert_eq!(counter.kind(), "invoke_counter_program");
        assert_eq!(counter.reason(), None);
    }
}
