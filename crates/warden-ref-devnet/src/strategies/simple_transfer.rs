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

/// Pays the counterparty a small fixed amount each cycle.
///
/// Pays `min(0.001, spend_cap)` SOL with a memo once the balance reaches
/// 0.02 SOL; otherwise does nothing.
#[derive(Debug, Clone)]
pub struct SimpleTransferStrategy {
    agent_id: AgentId,
    target: Option<Address>,
    spend_cap: Decimal,
}

impl SimpleTransferStrategy {
    pub const NAME: &'static str = "SimpleTransferStrategy";
    pub const AMOUNT: Decimal = dec!(0.001);
    pub const MIN_BALANCE: Decimal = dec!(0.02);

    pub fn new(ctx: &StrategyContext) -> Self {
        Self {
            agent_id: ctx.agent_id.clone(),
            target: ctx.target,
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
impl DecisionStrategy for SimpleTransferStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn decide(&self, observed: &ObservedState) -> WardenResult<Intent> {
        let amount = Self::AMOUNT.min(self.spend_cap);
        if amount <= Decimal::ZERO {
            return Ok(self.noop("spend cap is 0".to_string()));
        }
        if observed.balance < Self::MIN_BALANCE {
            return Ok(self.noop(format!(
                "Balance {:.6} SOL < {} SOL",
                observed.balance,
                Self::MIN_BALANCE
            )));
        }
        let Some(to) = self.target else {
            return Ok(self.noop("no counterparty to pay".to_string()));
        };
        Ok(Intent::TransferValue {
            agent_id: self.agent_id.clone(),
            to,
            amount,
            memo: Some(format!("{}: paying {amount} SOL", Self::NAME)),
            reason: Some(format!(
                "Balance {:.6} SOL >= {} SOL",
                observed.balance,
                Self::MIN_BALANCE
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(balance: Decimal) -> ObservedState {
        ObservedState {
            agent_id: AgentId::new("alpha"),
            address: Address([1u8; 32]),
            balance,
            lamports: 0,
        }
    }

    fn strategy(cap: Decimal) -> SimpleTransferStrategy {
        SimpleTransferStrategy::new(&StrategyContext {
            agent_id: AgentId::new("alpha"),
            spend_cap: cap,
            target: Some(Address([2u8; 32])),
        })
    }

    #[tokio::test]
    async fn pays_the_fixed_amount_with_a_memo() {
        let intent = strategy(dec!(0.01)).decide(&observed(dec!(1))).await.unwrap();
        match intent {
            Intent::TransferValue { to, amount, memo, .. } => {
                assert_eq!(to, Address([2u8; 32]));
                assert_eq!(amount, dec!(0.001));
                assert_eq!(memo.as_deref(), Some("SimpleTransferStrategy: paying 0.001 SOL"));
            }
            other => panic!("expected a transfer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn amount_is_capped_by_spend_cap() {
        let intent = strategy(dec!(0.0005)).decide(&observed(dec!(1))).await.unwrap();
        assert!(matches!(intent, Intent::TransferValue { amount, .. } if amount == dec!(0.0005)));
    }

    #[tokio::test]
    async fn low_balance_or_zero_cap_is_a_noop() {
        let low = strategy(dec!(0.01)).decide(&observed(dec!(0.019))).await.unwrap();
        assert_eq!(low.kind(), "no_op");
        assert_eq!(low.reason(), Some("Balance 0.019000 SOL < 0.02 SOL"));

        let capped = strategy(dec!(0)).decide(&observed(dec!(1))).await.unwrap();
        assert_eq!(capped.reason(), Some("spend cap is 0"));
    }
}
