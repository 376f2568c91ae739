//! # warden-core
//!
//! The execution runtime for WARDEN agents.
//!
//! This crate provides:
//! - The collaborator traits (`DecisionStrategy`, `AuditSink`)
//! - `Agent`, which binds an identity to its policy and key
//! - The `ExecutionEngine` that runs intents through policy, simulation and
//!   commit in that order
//! - `StrategyRegistry`, which resolves configured strategy names
//! - `RuntimeConfig`, the explicit configuration for all of the above
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{Agent, ExecutionEngine, traits::{AuditSink, DecisionStrategy}};
//!
//! let engine = ExecutionEngine::builder()
//!     .ledger(ledger)
//!     .audit(audit)
//!     .counter_client(CounterClient::reference()?)
//!     .config(config.engine_config())
//!     .build()?;
//! let outcome = engine.run_cycle(&agent, strategy.as_ref()).await?;
//! ```

pub mod agent;
pub mod config;
pub mod engine;
pub mod registry;
pub mod traits;

pub use agent::Agent;
pub use config::{EngineConfig, RuntimeConfig};
pub use engine::{ExecutionEngine, ExecutionEngineBuilder, SimulatedPlan, Stage};
pub use registry::{StrategyContext, StrategyRegistry};
