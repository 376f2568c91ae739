use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use warden_contracts::{
    address::Address,
    agent::{AgentId, ObservedState},
    error::WardenResult,
    intent::Intent,
};
use warden_core::{traits::DecisionStrategy, StrategyContext};

/// Allocates a slice of a healthy treasury to a worker agent.
#[derive(Debug, Clone)]
pub struct TreasuryAllocatorStrategy {
    agent_id: AgentId,
    worker: Option<Address>,
    spend_cap: Decimal,
}

impl TreasuryAllocatorStrategy {
    pub const NAME: &'static str = "TreasuryAllocatorStrategy";
    pub const AMOUNT: Decimal = dec!(0.002);
    pub const MIN_BALANCE: Decimal = dec!(0.05);

    pub fn new(ctx: &StrategyContext) -> Self {
        Self {
            agent_id: ctx.agent_id.clone(),
            worker: ctx.target,
            spend_cap: ctx.spend_cap,
        }
    }

    fn noop(&self, reason: String) -> Intent {
        Intent::NoOp {
            agent_id: self.agent_id.clone(),
            reason: Some(reason),
        }
    }
}

#[async_trait]
impl DecisionStrategy for TreasuryAllocatorStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn decide(&self, observed: &ObservedState) -> WardenResult<Intent> {
        let amount = Self::AMOUNT.min(self.spend_cap);
        if amount <= Decimal::ZERO {
            return Ok(self.noop("spend cap is 0".to_string()));
        }
        if observed.balance < Self::MIN_BALANCE {
            return Ok(self.noop(format!("Treasury balance low ({:.6} SOL)", observed.balance)));
        }
        let Some(to) = self.worker else {
            return Ok(self.noop("no worker to fund".to_string()));
        };
        Ok(Intent::TransferValue {
            agent_id: self.agent_id.clone(),
            to,
            amount,
            memo: Some(format!("{}: allocate {amount} SOL to worker", Self::NAME)),
            reason: Some(format!("Treasury balance healthy ({:.6} SOL)", observed.balance)),
        })
    }
}
