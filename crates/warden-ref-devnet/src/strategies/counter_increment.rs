use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use warden_contracts::{
    agent::{AgentId, ObservedState},
    error::WardenResult,
    intent::Intent,
};
use warden_core::{traits::DecisionStrategy, StrategyContext};

/// Bumps the agent's own counter whenever it can pay the fee.
#[derive(Debug, Clone)]
pub struct CounterIncrementStrategy {
    agent_id: AgentId,
}

impl CounterIncrementStrategy {
    pub const NAME: &'static str = "CounterIncrementStrategy";
    pub const MIN_BALANCE: Decimal = dec!(0.002);

    pub fn new(ctx: &StrategyContext) -> Self {
        Self {
            agent_id: ctx.agent_id.clone(),
        }
    }
}

#[async_trait]
impl DecisionStrategy for CounterIncrementStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn decide(&self, observed: &ObservedState) -> WardenResult<Intent> {
        if observed.balance < Self::MIN_BALANCE {
            return Ok(Intent::NoOp {
                agent_id: self.agent_id.clone(),
                reason: Some(format!(
                    "Balance too low for tx fees ({:.6} SOL)",
                    observed.balance
                )),
            });
        }
        Ok(Intent::InvokeCounterProgram {
            agent_id: self.agent_id.clone(),
            reason: Some("Increment per-agent counter".to_string()),
        })
    }
}
