//! Collaborator traits for the WARDEN execution pipeline.
//!
//! Two seams are defined here; the other two (`Ledger`, `Signer`) live in
//! warden-contracts because lower crates implement them.
//!
//! - `DecisionStrategy`: untrusted logic that turns observed state into an
//!   intent. Its output is never executed without passing policy.
//! - `AuditSink`: trusted, append-only record of what happened.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use warden_contracts::{
    agent::{AgentId, ObservedState},
    error::WardenResult,
    intent::Intent,
};

/// An agent's decision logic.
///
/// Strategies may read anything they like, but they cannot sign, send, or
/// bypass policy: all they can do is return an `Intent`.
#[async_trait]
pub trait DecisionStrategy: Send + Sync {
    /// Stable name, recorded in the audit log next to every decision.
    fn name(&self) -> &str;

    /// Decide what the agent should do given `observed`.
    ///
    /// Return `Intent::NoOp` with a reason to skip this cycle.
    async fn decide(&self, observed: &ObservedState) -> WardenResult<Intent>;
}

/// One audit record as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// The acting agent, or `system` for runtime-level events.
    pub agent_id: AgentId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl AuditEvent {
    pub fn new(agent_id: &AgentId, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.clone(),
            message: message.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Where audit events go.
///
/// Writes are infallible from the pipeline's point of view: a sink that
/// cannot persist an event logs the failure itself. Audit trouble never
/// aborts or alters an execution.
pub trait AuditSink: Send + Sync {
    fn write(&self, event: AuditEvent);
}
