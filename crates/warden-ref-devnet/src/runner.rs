//! The multi-agent round-robin scenario.
//!
//! Agents act in id order; each one's counterparty is the next agent,
//! wrapping around. Failed turns are recorded and the round continues: one
//! agent's rejected intent must not stop the others.

use serde_json::json;
use tracing::{debug, info, warn};
use warden_contracts::{
    agent::AgentId,
    amount::lamports_to_sol,
    error::{WardenError, WardenResult},
    outcome::ExecutionOutcome,
};
use warden_core::{
    traits::{AuditEvent, AuditSink, DecisionStrategy},
    Agent, ExecutionEngine, StrategyContext, StrategyRegistry,
};
use warden_custody::{KeyStore, Passphrase};
use warden_policy::AgentSpec;

/// An agent together with the strategy key its policy file names.
#[derive(Debug)]
pub struct Participant {
    pub agent: Agent,
    pub strategy: String,
}

/// What happened on one agent's turn.
#[derive(Debug)]
pub struct TurnReport {
    pub round: usize,
    pub agent_id: AgentId,
    pub target: AgentId,
    pub strategy: String,
    pub result: WardenResult<ExecutionOutcome>,
}

/// Load or create every agent's key, then build policies with `agent:<id>`
/// recipients resolved to the provisioned addresses.
pub fn provision(
    specs: &[AgentSpec],
    store: &KeyStore,
    passphrase: &Passphrase,
    audit: &dyn AuditSink,
) -> WardenResult<Vec<Participant>> {
    let mut keys = Vec::with_capacity(specs.len());
    for spec in specs {
        let (material, created) = store.load_or_create(&spec.id, passphrase)?;
        if created {
            audit.write(
                AuditEvent::new(&spec.id, "generated encrypted key")
                    .with_extra(json!({ "pubkey": material.address() })),
            );
        }
        keys.push(material);
    }

    let addresses: Vec<_> = specs.iter().zip(&keys).map(|(s, k)| (s.id.clone(), k.address())).collect();
    let resolve = |id: &AgentId| addresses.iter().find(|(a, _)| a == id).map(|(_, address)| *address);

    specs
        .iter()
        .zip(keys)
        .map(|(spec, material)| {
            let policy = spec.policy(&resolve)?;
            Ok(Participant {
                agent: Agent::new(spec.id.clone(), policy, material),
                strategy: spec.strategy.clone(),
            })
        })
        .collect()
}

/// Run `rounds` round-robin rounds over `participants`.
///
/// Strategies are resolved for every participant before the first cycle,
/// so a misconfigured strategy key fails with `Wiring` and nothing runs.
/// Per-turn execution errors are returned in the reports; only ledger
/// failures while taking the opening balance snapshot abort the run.
pub async fn run_round_robin(
    engine: &ExecutionEngine,
    participants: &[Participant],
    registry: &StrategyRegistry,
    rounds: usize,
) -> WardenResult<Vec<TurnReport>> {
    if participants.len() < 2 {
        return Err(WardenError::Config {
            reason: format!(
                "round-robin needs at least two agents, found {}",
                participants.len()
            ),
        });
    }

    let strategies = participants
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let target = &participants[(i + 1) % participants.len()].agent;
            let ctx = StrategyContext {
                agent_id: p.agent.id().clone(),
                spend_cap: p.agent.policy().spend_cap(),
                target: Some(target.address()),
            };
            registry.resolve(&p.strategy, &ctx)
        })
        .collect::<WardenResult<Vec<Box<dyn DecisionStrategy>>>>()?;

    let audit = engine.audit_sink();
    for p in participants {
        let lamports = engine.ledger().get_balance(&p.agent.address()).await?;
        audit.write(AuditEvent::new(p.agent.id(), "balance").with_extra(json!({
            "sol": lamports_to_sol(lamports),
            "pubkey": p.agent.address(),
        })));
    }

    let mut reports = Vec::with_capacity(rounds * participants.len());
    for round in 0..rounds {
        debug!(round, agents = participants.len(), "round-robin round starting");
        for (i, (actor, strategy)) in participants.iter().zip(&strategies).enumerate() {
            let target = participants[(i + 1) % participants.len()].agent.id();
            let result = engine.run_cycle(&actor.agent, strategy.as_ref()).await;
            match &result {
                Ok(outcome) => info!(
                    round,
                    agent_id = %actor.agent.id(),
                    target = %target,
                    signature = outcome.signature().unwrap_or("-"),
                    "turn finished"
                ),
                Err(e) => {
                    warn!(round, agent_id = %actor.agent.id(), target = %target, error = %e, "turn failed");
                    audit.write(AuditEvent::new(actor.agent.id(), "engine error").with_extra(json!({
                        "error": e.to_string(),
                        "target": target,
                    })));
                }
            }
            reports.push(TurnReport {
                round,
                agent_id: actor.agent.id().clone(),
                target: target.clone(),
                strategy: strategy.name().to_string(),
                result,
            });
        }
    }
    Ok(reports)
}
