//! The WARDEN execution engine: policy-gated, simulation-gated execution.
//!
//! Every intent follows one path:
//!
//!   Decided → Validated → Compiled → Simulated → (Committed | DryRunStopped) → Confirmed
//!
//! The safety invariants are structural:
//!
//! - Nothing is compiled or signed until every policy check has passed.
//! - Only a `SimulatedPlan` can be broadcast, and the only place one is
//!   constructed is the simulate step after the ledger reported success.
//! - A broadcast transaction is never rebroadcast or retried. Any failure
//!   after broadcast is surfaced with the signature so the caller can
//!   reconcile.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use warden_contracts::{
    address::{MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID},
    agent::{AgentId, ExecutionId, ObservedState},
    amount::{lamports_to_sol, sol_to_lamports},
    error::{WardenError, WardenResult},
    intent::Intent,
    ledger::Ledger,
    outcome::{CounterAction, ExecutionOutcome, OutcomeDetails},
    transaction::{Instruction, SignedTransaction, TransactionPlan},
};
use warden_policy::{check_programs, check_recipient, check_spend_cap};
use warden_program::{system, CounterClient};

use crate::{
    agent::Agent,
    config::EngineConfig,
    traits::{AuditEvent, AuditSink, DecisionStrategy},
};

/// Where an execution currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decided,
    Validated,
    Compiled,
    Simulated,
    DryRunStopped,
    Committed,
    Confirmed,
}

/// A signed transaction that has not been simulated yet.
struct CompiledPlan {
    tx: SignedTransaction,
    details: OutcomeDetails,
}

/// A signed transaction the ledger accepted in a dry run.
///
/// Fields are private and there is no public constructor: the engine's
/// simulate step is the only producer, and `commit` consumes it by value.
#[derive(Debug)]
pub struct SimulatedPlan {
    tx: SignedTransaction,
    details: OutcomeDetails,
    logs: Vec<String>,
}

impl SimulatedPlan {
    pub fn details(&self) -> &OutcomeDetails {
        &self.details
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }
}

/// Runs intents for any number of agents against one ledger.
///
/// Holds no per-agent state, so one engine can serve concurrent executions.
pub struct ExecutionEngine {
    ledger: Arc<dyn Ledger>,
    audit: Arc<dyn AuditSink>,
    counter: CounterClient,
    config: EngineConfig,
}

/// Wires an `ExecutionEngine`. `build()` fails if a collaborator is missing.
#[derive(Default)]
pub struct ExecutionEngineBuilder {
    ledger: Option<Arc<dyn Ledger>>,
    audit: Option<Arc<dyn AuditSink>>,
    counter: Option<CounterClient>,
    config: EngineConfig,
}

impl ExecutionEngineBuilder {
    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn counter_client(mut self, counter: CounterClient) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WardenResult<ExecutionEngine> {
        let missing = |what: &str| WardenError::Wiring {
            reason: format!("execution engine requires a {what}"),
        };
        Ok(ExecutionEngine {
            ledger: self.ledger.ok_or_else(|| missing("ledger"))?,
            audit: self.audit.ok_or_else(|| missing("audit sink"))?,
            counter: self.counter.ok_or_else(|| missing("counter program client"))?,
            config: self.config,
        })
    }
}

impl ExecutionEngine {
    pub fn builder() -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    /// The sink every execution writes to. Callers may add their own events.
    pub fn audit_sink(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    pub fn counter_client(&self) -> &CounterClient {
        &self.counter
    }

    /// Observe the agent, ask its strategy for an intent, and execute it.
    pub async fn run_cycle(
        &self,
        agent: &Agent,
        strategy: &dyn DecisionStrategy,
    ) -> WardenResult<ExecutionOutcome> {
        let lamports = self.ledger.get_balance(&agent.address()).await?;
        let observed = ObservedState {
            agent_id: agent.id().clone(),
            address: agent.address(),
            balance: lamports_to_sol(lamports),
            lamports,
        };
        debug!(
            agent_id = %agent.id(),
            balance = %observed.balance,
            strategy = %strategy.name(),
            "running decision cycle"
        );

        let intent = strategy.decide(&observed).await?;
        self.audit.write(
            AuditEvent::new(agent.id(), "brain decided intent").with_extra(json!({
                "strategy": strategy.name(),
                "balance": observed.balance,
                "intent": intent,
            })),
        );

        let outcome = self.execute(agent, intent).await?;
        self.audit.write(
            AuditEvent::new(agent.id(), "engine result").with_extra(json!({
                "signature": outcome.signature(),
                "outcome": outcome,
            })),
        );
        Ok(outcome)
    }

    /// Execute one intent on behalf of `agent`.
    ///
    /// # Pipeline
    ///
    /// 1. `NoOp` returns `Skipped` without touching the ledger
    /// 2. Policy: spend cap, recipient and programs for transfers; programs
    ///    for counter invocations. Any violation aborts before compilation.
    /// 3. Compile and sign against a fresh freshness anchor
    /// 4. Simulate; an error aborts, nothing is broadcast
    /// 5. In simulate-only mode, stop with `Simulated`
    /// 6. Broadcast once, confirm with a timeout
    /// 7. For counter invocations, read the new count
    ///
    /// # Errors
    ///
    /// `PolicyViolation` from step 2, `SimulationFailed` from step 4 and
    /// `CommitFailed` from step 6. Errors are returned, never retried.
    pub async fn execute(&self, agent: &Agent, intent: Intent) -> WardenResult<ExecutionOutcome> {
        let execution_id = ExecutionId::new();

        if intent.agent_id() != agent.id() {
            return Err(WardenError::Wiring {
                reason: format!(
                    "intent for agent '{}' handed to agent '{}'",
                    intent.agent_id(),
                    agent.id()
                ),
            });
        }

        debug!(
            execution_id = %execution_id,
            agent_id = %agent.id(),
            kind = intent.kind(),
            stage = ?Stage::Decided,
            "execution starting"
        );

        // ── Step 1: No-op short circuit ──────────────────────────────────────
        if let Intent::NoOp { reason, .. } = &intent {
            debug!(execution_id = %execution_id, agent_id = %agent.id(), "no-op intent, skipping");
            self.audit.write(
                AuditEvent::new(agent.id(), "no-op").with_extra(json!({
                    "executionId": execution_id,
                    "reason": reason,
                })),
            );
            return Ok(ExecutionOutcome::Skipped {
                execution_id,
                agent_id: agent.id().clone(),
                reason: reason.clone(),
            });
        }

        // ── Step 2: Policy validation ────────────────────────────────────────
        //
        // The primary gate. Nothing below runs unless every check passes.
        if let Err(e) = self.validate(agent, &intent) {
            warn!(
                execution_id = %execution_id,
                agent_id = %agent.id(),
                kind = intent.kind(),
                error = %e,
                "policy rejected intent"
            );
            self.audit.write(
                AuditEvent::new(agent.id(), "policy rejected").with_extra(json!({
                    "executionId": execution_id,
                    "intent": intent,
                    "error": e.to_string(),
                })),
            );
            return Err(e);
        }
        debug!(execution_id = %execution_id, stage = ?Stage::Validated, "policy checks passed");

        // ── Step 3: Compile and sign ─────────────────────────────────────────
        let compiled = self.compile(agent, &intent).await?;
        debug!(
            execution_id = %execution_id,
            stage = ?Stage::Compiled,
            signature = %compiled.tx.id(),
            "transaction compiled and signed"
        );

        // ── Step 4: Simulate ─────────────────────────────────────────────────
        let simulated = self.simulate(compiled, &intent).await?;
        self.audit.write(
            AuditEvent::new(agent.id(), "simulation ok").with_extra(json!({
                "executionId": execution_id,
                "logs": simulated.logs,
            })),
        );

        // ── Step 5: Dry-run stop ─────────────────────────────────────────────
        if self.config.simulate_only {
            info!(
                execution_id = %execution_id,
                agent_id = %agent.id(),
                stage = ?Stage::DryRunStopped,
                "simulate-only mode, not broadcasting"
            );
            self.audit.write(
                AuditEvent::new(agent.id(), "SIMULATE_ONLY enabled, skipping send")
                    .with_extra(json!({ "executionId": execution_id })),
            );
            return Ok(ExecutionOutcome::Simulated {
                execution_id,
                agent_id: agent.id().clone(),
                details: simulated.details,
                logs: simulated.logs,
            });
        }

        // ── Step 6: Broadcast and confirm ────────────────────────────────────
        let (signature, details) = self.commit(execution_id, agent.id(), simulated).await?;

        // ── Step 7: Post-commit counter read ─────────────────────────────────
        let details = match details {
            OutcomeDetails::Counter { action, counter, before, .. } => {
                let after = self.read_count_after_commit(agent, &execution_id).await;
                OutcomeDetails::Counter { action, counter, before, after }
            }
            transfer => transfer,
        };

        self.audit.write(
            AuditEvent::new(agent.id(), "committed").with_extra(json!({
                "executionId": execution_id,
                "signature": signature,
                "details": details,
            })),
        );
        Ok(ExecutionOutcome::Committed {
            execution_id,
            agent_id: agent.id().clone(),
            signature,
            details,
        })
    }

    fn validate(&self, agent: &Agent, intent: &Intent) -> WardenResult<()> {
        let policy = agent.policy();
        match intent {
            Intent::TransferValue { to, amount, memo, .. } => {
                check_spend_cap(policy, *amount)?;
                check_recipient(policy, to)?;
                let mut programs = vec![SYSTEM_PROGRAM_ID];
                if memo.is_some() {
                    programs.push(MEMO_PROGRAM_ID);
                }
                check_programs(policy, &programs)?;
            }
            Intent::InvokeCounterProgram { .. } => {
                check_programs(policy, [self.counter.program_id()])?;
            }
            Intent::NoOp { .. } => {}
        }
        Ok(())
    }

    async fn compile(&self, agent: &Agent, intent: &Intent) -> WardenResult<CompiledPlan> {
        let authority = agent.address();
        let (instructions, details): (Vec<Instruction>, OutcomeDetails) = match intent {
            Intent::TransferValue { to, amount, memo, .. } => {
                let lamports = sol_to_lamports(*amount)?;
                let mut instructions = vec![system::transfer(&authority, to, lamports)];
                if let Some(text) = memo {
                    instructions.push(system::memo(text));
                }
                let details = OutcomeDetails::Transfer {
                    to: *to,
                    lamports,
                    memo: memo.clone(),
                };
                (instructions, details)
            }
            Intent::InvokeCounterProgram { .. } => {
                let (counter, _) = self.counter.derive_pda(&authority)?;
                let exists = self.counter.account_exists(self.ledger.as_ref(), &counter).await?;
                let action = if exists {
                    CounterAction::Increment
                } else {
                    CounterAction::Initialize
                };
                let before = if exists {
                    self.read_count_before(agent).await?
                } else {
                    None
                };
                debug!(agent_id = %agent.id(), %counter, %action, ?before, "counter action chosen");
                let instruction = self.counter.encode_instruction(action, &authority)?;
                let details = OutcomeDetails::Counter {
                    action,
                    counter,
                    before,
                    after: None,
                };
                (vec![instruction], details)
            }
            Intent::NoOp { .. } => {
                return Err(WardenError::InvalidIntent {
                    reason: "no-op intents are never compiled".to_string(),
                })
            }
        };

        let anchor = self.ledger.latest_anchor().await?;
        let tx = TransactionPlan::compile(authority, &instructions, anchor)?.sign(agent.signer())?;
        Ok(CompiledPlan { tx, details })
    }

    /// Dry-run `plan`. The returned `SimulatedPlan` is the only thing
    /// `commit` accepts.
    async fn simulate(&self, plan: CompiledPlan, intent: &Intent) -> WardenResult<SimulatedPlan> {
        let failed = |reason: String| WardenError::SimulationFailed {
            intent: intent.kind().to_string(),
            reason,
        };
        let report = self
            .ledger
            .simulate(&plan.tx)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if let Some(error) = report.error {
            warn!(
                agent_id = %intent.agent_id(),
                kind = intent.kind(),
                %error,
                logs = ?report.logs,
                "simulation failed"
            );
            return Err(failed(error));
        }
        debug!(
            agent_id = %intent.agent_id(),
            stage = ?Stage::Simulated,
            units = ?report.units_consumed,
            "simulation ok"
        );
        Ok(SimulatedPlan {
            tx: plan.tx,
            details: plan.details,
            logs: report.logs,
        })
    }

    async fn commit(
        &self,
        execution_id: ExecutionId,
        agent_id: &AgentId,
        plan: SimulatedPlan,
    ) -> WardenResult<(String, OutcomeDetails)> {
        let signature = self
            .ledger
            .broadcast(&plan.tx)
            .await
            .map_err(|e| WardenError::CommitFailed {
                signature: None,
                reason: format!("broadcast failed: {e}"),
            })?;
        info!(
            execution_id = %execution_id,
            agent_id = %agent_id,
            stage = ?Stage::Committed,
            %signature,
            "transaction broadcast"
        );

        let confirmation = tokio::time::timeout(
            self.config.confirm_timeout,
            self.ledger
                .confirm(&signature, plan.tx.anchor(), self.config.commitment),
        )
        .await;
        match confirmation {
            Ok(Ok(())) => {
                info!(
                    execution_id = %execution_id,
                    agent_id = %agent_id,
                    stage = ?Stage::Confirmed,
                    %signature,
                    commitment = %self.config.commitment,
                    "transaction confirmed"
                );
                Ok((signature, plan.details))
            }
            Ok(Err(e)) => {
                warn!(execution_id = %execution_id, %signature, error = %e, "confirmation failed");
                Err(WardenError::CommitFailed {
                    signature: Some(signature),
                    reason: format!("confirmation failed: {e}"),
                })
            }
            Err(_) => {
                warn!(execution_id = %execution_id, %signature, "confirmation timed out");
                Err(WardenError::CommitFailed {
                    signature: Some(signature),
                    reason: format!(
                        "not confirmed within {}s",
                        self.config.confirm_timeout.as_secs_f64()
                    ),
                })
            }
        }
    }

    /// Best-effort read before compiling: an undecodable account is
    /// reported as an unknown count, a ledger failure aborts.
    async fn read_count_before(&self, agent: &Agent) -> WardenResult<Option<u64>> {
        match self.counter.fetch_counter(self.ledger.as_ref(), &agent.address()).await {
            Ok(counter) => Ok(counter.map(|c| c.count)),
            Err(WardenError::Decode { reason }) => {
                warn!(agent_id = %agent.id(), %reason, "could not decode counter before execution");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// After commit the transaction has landed; no read failure may mask that.
    async fn read_count_after_commit(&self, agent: &Agent, execution_id: &ExecutionId) -> Option<u64> {
        match self.counter.fetch_counter(self.ledger.as_ref(), &agent.address()).await {
            Ok(counter) => counter.map(|c| c.count),
            Err(e) => {
                warn!(
                    execution_id = %execution_id,
                    agent_id = %agent.id(),
                    error = %e,
                    "could not read counter after commit"
                );
                None
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use warden_contracts::{
        address::Address,
        error::{LedgerError, PolicyViolation},
        ledger::{AccountInfo, Commitment, SimulationReport},
        policy::Policy,
        transaction::{Blockhash, FreshnessAnchor},
    };
    use warden_custody::KeyMaterial;
    use warden_program::{CounterAccount, COUNTER_PROGRAM_ID};

    use super::*;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A ledger that records every call in order and can be told to fail.
    #[derive(Default)]
    struct MockLedger {
        calls: Arc<Mutex<Vec<&'static str>>>,
        accounts: Arc<Mutex<HashMap<Address, AccountInfo>>>,
        balance: u64,
        simulate_error: Option<String>,
        broadcast_fails: bool,
        confirm_fails: bool,
        confirm_hangs: bool,
    }

    impl MockLedger {
        fn log(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Ledger for MockLedger {
        async fn get_balance(&self, _: &Address) -> Result<u64, LedgerError> {
            self.log("get_balance");
            Ok(self.balance)
        }

        async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
            self.log("get_account");
            Ok(self.accounts.lock().unwrap().get(address).cloned())
        }

        async fn latest_anchor(&self) -> Result<FreshnessAnchor, LedgerError> {
            self.log("latest_anchor");
            Ok(FreshnessAnchor {
                blockhash: Blockhash([3u8; 32]),
                last_valid_block_height: 300,
            })
        }

        async fn simulate(&self, _: &SignedTransaction) -> Result<SimulationReport, LedgerError> {
            self.log("simulate");
            Ok(SimulationReport {
                error: self.simulate_error.clone(),
                logs: vec!["Program log: ok".to_string()],
                units_consumed: Some(150),
            })
        }

        async fn broadcast(&self, tx: &SignedTransaction) -> Result<String, LedgerError> {
            self.log("broadcast");
            if self.broadcast_fails {
                return Err(LedgerError::Rpc("connection reset".to_string()));
            }
            Ok(tx.id())
        }

        async fn confirm(&self, _: &str, _: &FreshnessAnchor, _: Commitment) -> Result<(), LedgerError> {
            self.log("confirm");
            if self.confirm_hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.confirm_fails {
                return Err(LedgerError::BlockhashExpired {
                    last_valid_block_height: 300,
                    current_height: 301,
                });
            }
            Ok(())
        }
    }

    /// An audit sink that keeps every event for later inspection.
    #[derive(Default)]
    struct MockAudit {
        events: Arc<Mutex<Vec<AuditEvent>>>,
    }

    impl MockAudit {
        fn messages(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|e| e.message.clone()).collect()
        }
    }

    impl AuditSink for MockAudit {
        fn write(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// A strategy that returns a fixed intent and counts its calls.
    struct FixedStrategy {
        intent: Intent,
        calls: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl DecisionStrategy for FixedStrategy {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn decide(&self, _observed: &ObservedState) -> WardenResult<Intent> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.intent.clone())
        }
    }

    fn recipient() -> Address {
        Address([9u8; 32])
    }

    fn agent_with(cap: Decimal, programs: Vec<Address>) -> Agent {
        let policy = Policy::new(cap, [recipient()], programs).unwrap();
        Agent::new(AgentId::new("alpha"), policy, KeyMaterial::generate())
    }

    fn transfer_agent() -> Agent {
        agent_with(dec!(0.01), vec![SYSTEM_PROGRAM_ID, MEMO_PROGRAM_ID])
    }

    fn transfer(amount: Decimal, memo: Option<&str>) -> Intent {
        Intent::TransferValue {
            agent_id: AgentId::new("alpha"),
            to: recipient(),
            amount,
            memo: memo.map(str::to_string),
            reason: None,
        }
    }

    fn counter_intent() -> Intent {
        Intent::InvokeCounterProgram {
            agent_id: AgentId::new("alpha"),
            reason: None,
        }
    }

    fn engine(ledger: Arc<MockLedger>, audit: Arc<MockAudit>, config: EngineConfig) -> ExecutionEngine {
        ExecutionEngine::builder()
            .ledger(ledger)
            .audit(audit)
            .counter_client(CounterClient::reference().unwrap())
            .config(config)
            .build()
            .unwrap()
    }

    fn live() -> EngineConfig {
        EngineConfig {
            confirm_timeout: Duration::from_millis(200),
            ..EngineConfig::default()
        }
    }

    // ── Wiring ───────────────────────────────────────────────────────────────

    #[test]
    fn build_without_ledger_is_a_wiring_error() {
        let result = ExecutionEngine::builder()
            .audit(Arc::new(MockAudit::default()))
            .counter_client(CounterClient::new(COUNTER_PROGRAM_ID))
            .build();
        match result {
            Err(WardenError::Wiring { reason }) => assert!(reason.contains("ledger")),
            Err(other) => panic!("expected Wiring, got {other:?}"),
            Ok(_) => panic!("expected Wiring, got an engine"),
        }
    }

    #[tokio::test]
    async fn intent_for_another_agent_is_a_wiring_error() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());
        let foreign = Intent::NoOp {
            agent_id: AgentId::new("mallory"),
            reason: None,
        };
        let err = engine.execute(&transfer_agent(), foreign).await.unwrap_err();
        assert!(matches!(err, WardenError::Wiring { .. }));
        assert!(ledger.calls().is_empty());
    }

    // ── No-op ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn noop_is_skipped_without_touching_the_ledger() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());
        let intent = Intent::NoOp {
            agent_id: AgentId::new("alpha"),
            reason: Some("balance too low".to_string()),
        };

        let outcome = engine.execute(&transfer_agent(), intent).await.unwrap();
        match outcome {
            ExecutionOutcome::Skipped { reason, .. } => assert_eq!(reason.as_deref(), Some("balance too low")),
            other => panic!("expected Skipped, got {other:?}"),
        }
        assert!(ledger.calls().is_empty());
    }

    // ── Policy gate ──────────────────────────────────────────────────────────

    /// Core safety test: a rejected intent never reaches compilation, so the
    /// ledger sees no anchor request, no simulation and no broadcast.
    #[tokio::test]
    async fn spend_cap_violation_stops_before_compilation() {
        let ledger = Arc::new(MockLedger::default());
        let audit = Arc::new(MockAudit::default());
        let engine = engine(ledger.clone(), audit.clone(), live());

        let err = engine.execute(&transfer_agent(), transfer(dec!(0.5), None)).await.unwrap_err();
        match err {
            WardenError::PolicyViolation(PolicyViolation::SpendCapExceeded { amount, cap }) => {
                assert_eq!(amount, dec!(0.5));
                assert_eq!(cap, dec!(0.01));
            }
            other => panic!("expected SpendCapExceeded, got {other:?}"),
        }
        assert!(ledger.calls().is_empty());
        assert_eq!(audit.messages(), vec!["policy rejected"]);
    }

    #[tokio::test]
    async fn unlisted_recipient_is_rejected() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());
        let intent = Intent::TransferValue {
            agent_id: AgentId::new("alpha"),
            to: Address([1u8; 32]),
            amount: dec!(0.001),
            memo: None,
            reason: None,
        };
        let err = engine.execute(&transfer_agent(), intent).await.unwrap_err();
        assert!(matches!(
            err,
            WardenError::PolicyViolation(PolicyViolation::RecipientNotAllowed { .. })
        ));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn memo_requires_the_memo_program_to_be_allowed() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());
        let agent = agent_with(dec!(0.01), vec![SYSTEM_PROGRAM_ID]);

        let err = engine.execute(&agent, transfer(dec!(0.001), Some("hi"))).await.unwrap_err();
        match err {
            WardenError::PolicyViolation(PolicyViolation::ProgramNotAllowed { program }) => {
                assert_eq!(program, MEMO_PROGRAM_ID.to_base58());
            }
            other => panic!("expected ProgramNotAllowed, got {other:?}"),
        }

        // Without a memo the same agent may transfer.
        let outcome = engine.execute(&agent, transfer(dec!(0.001), None)).await.unwrap();
        assert!(outcome.is_committed());
    }

    #[tokio::test]
    async fn counter_requires_the_counter_program_to_be_allowed() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let err = engine.execute(&transfer_agent(), counter_intent()).await.unwrap_err();
        assert!(matches!(
            err,
            WardenError::PolicyViolation(PolicyViolation::ProgramNotAllowed { .. })
        ));
        assert!(ledger.calls().is_empty());
    }

    // ── Simulation gate ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn successful_transfer_simulates_before_broadcast() {
        let ledger = Arc::new(MockLedger::default());
        let audit = Arc::new(MockAudit::default());
        let engine = engine(ledger.clone(), audit.clone(), live());

        let outcome = engine
            .execute(&transfer_agent(), transfer(dec!(0.001), Some("paying")))
            .await
            .unwrap();

        assert_eq!(ledger.calls(), vec!["latest_anchor", "simulate", "broadcast", "confirm"]);
        match outcome {
            ExecutionOutcome::Committed { signature, details, .. } => {
                assert!(!signature.is_empty());
                assert_eq!(
                    details,
                    OutcomeDetails::Transfer {
                        to: recipient(),
                        lamports: 1_000_000,
                        memo: Some("paying".to_string()),
                    }
                );
            }
            other => panic!("expected Committed, got {other:?}"),
        }
        assert_eq!(audit.messages(), vec!["simulation ok", "committed"]);
    }

    #[tokio::test]
    async fn simulation_error_prevents_broadcast() {
        let ledger = Arc::new(MockLedger {
            simulate_error: Some("insufficient lamports".to_string()),
            ..MockLedger::default()
        });
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let err = engine.execute(&transfer_agent(), transfer(dec!(0.001), None)).await.unwrap_err();
        match err {
            WardenError::SimulationFailed { intent, reason } => {
                assert_eq!(intent, "transfer_value");
                assert!(reason.contains("insufficient lamports"));
            }
            other => panic!("expected SimulationFailed, got {other:?}"),
        }
        assert!(!ledger.calls().contains(&"broadcast"));
    }

    #[tokio::test]
    async fn simulate_only_stops_after_the_dry_run() {
        let ledger = Arc::new(MockLedger::default());
        let config = EngineConfig {
            simulate_only: true,
            ..live()
        };
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), config);

        let outcome = engine.execute(&transfer_agent(), transfer(dec!(0.001), None)).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Simulated { .. }));
        assert_eq!(outcome.signature(), None);
        assert_eq!(ledger.calls(), vec!["latest_anchor", "simulate"]);
    }

    // ── Commit failures ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn broadcast_failure_has_no_signature() {
        let ledger = Arc::new(MockLedger {
            broadcast_fails: true,
            ..MockLedger::default()
        });
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let err = engine.execute(&transfer_agent(), transfer(dec!(0.001), None)).await.unwrap_err();
        assert!(matches!(err, WardenError::CommitFailed { signature: None, .. }));
        assert!(!ledger.calls().contains(&"confirm"));
    }

    #[tokio::test]
    async fn confirmation_failure_reports_the_signature_and_never_rebroadcasts() {
        let ledger = Arc::new(MockLedger {
            confirm_fails: true,
            ..MockLedger::default()
        });
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let err = engine.execute(&transfer_agent(), transfer(dec!(0.001), None)).await.unwrap_err();
        match err {
            WardenError::CommitFailed { signature, reason } => {
                assert!(signature.is_some());
                assert!(reason.contains("blockhash expired"));
            }
            other => panic!("expected CommitFailed, got {other:?}"),
        }
        let broadcasts = ledger.calls().iter().filter(|c| **c == "broadcast").count();
        assert_eq!(broadcasts, 1);
    }

    #[tokio::test]
    async fn confirmation_timeout_is_a_commit_failure() {
        let ledger = Arc::new(MockLedger {
            confirm_hangs: true,
            ..MockLedger::default()
        });
        let config = EngineConfig {
            confirm_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), config);

        let err = engine.execute(&transfer_agent(), transfer(dec!(0.001), None)).await.unwrap_err();
        match err {
            WardenError::CommitFailed { signature, reason } => {
                assert!(signature.is_some());
                assert!(reason.contains("not confirmed"));
            }
            other => panic!("expected CommitFailed, got {other:?}"),
        }
    }

    // ── Counter program ──────────────────────────────────────────────────────

    fn counter_agent() -> Agent {
        agent_with(dec!(0), vec![COUNTER_PROGRAM_ID])
    }

    #[tokio::test]
    async fn missing_counter_is_initialized() {
        let ledger = Arc::new(MockLedger::default());
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let outcome = engine.execute(&counter_agent(), counter_intent()).await.unwrap();
        match outcome.details() {
            Some(OutcomeDetails::Counter { action, before, after, .. }) => {
                assert_eq!(*action, CounterAction::Initialize);
                assert_eq!(*before, None);
                // The mock never creates the account.
                assert_eq!(*after, None);
            }
            other => panic!("expected counter details, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_counter_is_incremented_with_before_read() {
        let ledger = Arc::new(MockLedger::default());
        let agent = counter_agent();
        let client = CounterClient::reference().unwrap();
        let (pda, _) = client.derive_pda(&agent.address()).unwrap();
        ledger.accounts.lock().unwrap().insert(
            pda,
            AccountInfo {
                lamports: 1_000_000,
                owner: COUNTER_PROGRAM_ID,
                data: CounterAccount { authority: agent.address(), count: 4 }.to_bytes(),
            },
        );
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let outcome = engine.execute(&agent, counter_intent()).await.unwrap();
        match outcome.details() {
            Some(OutcomeDetails::Counter { action, counter, before, after }) => {
                assert_eq!(*action, CounterAction::Increment);
                assert_eq!(*counter, pda);
                assert_eq!(*before, Some(4));
                assert_eq!(*after, Some(4));
            }
            other => panic!("expected counter details, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_counter_does_not_abort_execution() {
        let ledger = Arc::new(MockLedger::default());
        let agent = counter_agent();
        let (pda, _) = CounterClient::reference().unwrap().derive_pda(&agent.address()).unwrap();
        ledger.accounts.lock().unwrap().insert(
            pda,
            AccountInfo {
                lamports: 1,
                owner: COUNTER_PROGRAM_ID,
                data: vec![0u8; 12],
            },
        );
        let engine = engine(ledger.clone(), Arc::new(MockAudit::default()), live());

        let outcome = engine.execute(&agent, counter_intent()).await.unwrap();
        assert!(outcome.is_committed());
        assert!(matches!(
            outcome.details(),
            Some(OutcomeDetails::Counter { action: CounterAction::Increment, before: None, .. })
        ));
    }

    // ── Decision cycle ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_cycle_observes_decides_and_audits() {
        let ledger = Arc::new(MockLedger {
            balance: 2_500_000_000,
            ..MockLedger::default()
        });
        let audit = Arc::new(MockAudit::default());
        let engine = engine(ledger.clone(), audit.clone(), live());
        let calls = Arc::new(Mutex::new(0));
        let strategy = FixedStrategy {
            intent: transfer(dec!(0.001), None),
            calls: calls.clone(),
        };

        let outcome = engine.run_cycle(&transfer_agent(), &strategy).await.unwrap();
        assert!(outcome.is_committed());
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(ledger.calls()[0], "get_balance");

        let events = audit.events.lock().unwrap();
        assert_eq!(events.first().unwrap().message, "brain decided intent");
        let extra = events.first().unwrap().extra.as_ref().unwrap();
        assert_eq!(extra["strategy"], "fixed");
        assert_eq!(extra["intent"]["kind"], "transfer_value");
        assert_eq!(events.last().unwrap().message, "engine result");
    }
}
