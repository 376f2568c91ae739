use warden_contracts::{
    address::Address,
    agent::AgentId,
    policy::Policy,
    transaction::Signer,
};
use warden_custody::KeyMaterial;

/// An autonomous actor: an identity, its guardrails, and its key.
///
/// This is the only agent representation the engine accepts. The key never
/// leaves this struct except as a `&dyn Signer`.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    policy: Policy,
    keys: KeyMaterial,
}

impl Agent {
    pub fn new(id: AgentId, policy: Policy, keys: KeyMaterial) -> Self {
        Self { id, policy, keys }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn address(&self) -> Address {
        self.keys.address()
    }

    pub fn signer(&self) -> &dyn Signer {
        &self.keys
    }
}
