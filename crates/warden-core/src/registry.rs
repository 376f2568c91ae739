//! Named strategy factories.
//!
//! Agents name their strategy in configuration. The registry turns that name
//! into a `DecisionStrategy` when the runtime is wired, so a typo or a
//! missing implementation fails before any cycle runs.

use std::{collections::BTreeMap, fmt};

use rust_decimal::Decimal;
use tracing::debug;
use warden_contracts::{
    address::Address,
    agent::AgentId,
    error::{WardenError, WardenResult},
};

use crate::traits::DecisionStrategy;

/// What a factory knows when it builds a strategy for one agent.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub agent_id: AgentId,
    pub spend_cap: Decimal,
    /// Counterparty for strategies that pay someone, if the runtime has one.
    pub target: Option<Address>,
}

type Factory = Box<dyn Fn(&StrategyContext) -> Box<dyn DecisionStrategy> + Send + Sync>;

#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, Factory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&StrategyContext) -> Box<dyn DecisionStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the strategy registered under `name` for `ctx`.
    ///
    /// Fails with `WardenError::Wiring` when nothing registered under `name`
    /// can provide `decide`.
    pub fn resolve(&self, name: &str, ctx: &StrategyContext) -> WardenResult<Box<dyn DecisionStrategy>> {
        let factory = self.factories.get(name).ok_or_else(|| WardenError::Wiring {
            reason: format!(
                "agent '{}' names strategy '{name}', but no registered strategy provides decide() under that name (known: {})",
                ctx.agent_id,
                self.names().collect::<Vec<_>>().join(", ")
            ),
        })?;
        let strategy = factory(ctx);
        debug!(agent_id = %ctx.agent_id, strategy = %strategy.name(), "resolved strategy");
        Ok(strategy)
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use warden_contracts::{agent::ObservedState, intent::Intent};

    use super::*;

    struct Idle;

    #[async_trait]
    impl DecisionStrategy for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        async fn decide(&self, observed: &ObservedState) -> WardenResult<Intent> {
            Ok(Intent::NoOp {
                agent_id: observed.agent_id.clone(),
                reason: None,
            })
        }
    }

    fn ctx() -> StrategyContext {
        StrategyContext {
            agent_id: AgentId::new("alpha"),
            spend_cap: dec!(0.01),
            target: None,
        }
    }

    #[test]
    fn registered_strategy_resolves() {
        let mut registry = StrategyRegistry::new();
        registry.register("idle", |_| Box::new(Idle));
        assert!(registry.contains("idle"));
        assert_eq!(registry.resolve("idle", &ctx()).unwrap().name(), "idle");
    }

    #[test]
    fn unknown_name_is_a_wiring_error() {
        let mut registry = StrategyRegistry::new();
        registry.register("idle", |_| Box::new(Idle));
        match registry.resolve("treasury", &ctx()) {
            Err(WardenError::Wiring { reason }) => {
                assert!(reason.contains("treasury"));
                assert!(reason.contains("decide()"));
                assert!(reason.contains("idle"));
            }
            Err(other) => panic!("expected Wiring, got {other:?}"),
            Ok(_) => panic!("expected Wiring, got a strategy"),
        }
    }
}
