//! The reference decision strategies.
//!
//! Each agent file names one of these by key. Unknown keys fail when the
//! registry resolves them, before any cycle runs.

pub mod counter_increment;
pub mod simple_transfer;
pub mod treasury;

use warden_core::StrategyRegistry;

pub use counter_increment::CounterIncrementStrategy;
pub use simple_transfer::SimpleTransferStrategy;
pub use treasury::TreasuryAllocatorStrategy;

pub const SIMPLE_TRANSFER: &str = "simple_transfer";
pub const TREASURY: &str = "treasury";
pub const COUNTER_INCREMENT: &str = "counter_increment";

/// A registry holding the three reference strategies under their keys.
pub fn reference_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry
        .register(SIMPLE_TRANSFER, |ctx| Box::new(SimpleTransferStrategy::new(ctx)))
        .register(TREASURY, |ctx| Box::new(TreasuryAllocatorStrategy::new(ctx)))
        .register(COUNTER_INCREMENT, |ctx| Box::new(CounterIncrementStrategy::new(ctx)));
    registry
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use warden_contracts::agent::AgentId;
    use warden_core::StrategyContext;

    use super::*;

    #[test]
    fn reference_registry_resolves_every_key() {
        let registry = reference_registry();
        let ctx = StrategyContext {
            agent_id: AgentId::new("alpha"),
            spend_cap: dec!(0.01),
            target: None,
        };
        for (key, name) in [
            (SIMPLE_TRANSFER, "SimpleTransferStrategy"),
            (TREASURY, "TreasuryAllocatorStrategy"),
            (COUNTER_INCREMENT, "CounterIncrementStrategy"),
        ] {
            assert_eq!(registry.resolve(key, &ctx).unwrap().name(), name);
        }
        assert!(registry.resolve("arbitrage", &ctx).is_err());
    }
}
