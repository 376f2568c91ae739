//! WARDEN reference runtime demo CLI.
//!
//! Runs policy-guarded agents against the in-process devnet. Keys live
//! encrypted under `keys_dir`; the passphrase comes from the environment
//! variable named by `passphrase_env` (default `WARDEN_KEY_PASSPHRASE`).
//!
//! Usage:
//!   cargo run -p demo -- run --rounds 2
//!   cargo run -p demo -- run --simulate-only
//!   cargo run -p demo -- agents
//!   cargo run -p demo -- address --agent alpha
//!   cargo run -p demo -- create-agent --id delta
//!   cargo run -p demo -- policy --id alpha

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use warden_audit::{new_run_id, JsonlAuditSink};
use warden_contracts::{
    agent::AgentId,
    amount::{lamports_to_sol, sol_to_lamports},
    error::{WardenError, WardenResult},
    outcome::{ExecutionOutcome, OutcomeDetails},
};
use warden_core::{
    traits::{AuditEvent, AuditSink},
    ExecutionEngine, RuntimeConfig,
};
use warden_custody::KeyStore;
use warden_policy::{config::list_agent_ids, load_dir, AgentSpec, RecipientRef};
use warden_program::{CounterClient, ProgramIdl, COUNTER_PROGRAM_ID};
use warden_ref_devnet::{provision, reference_registry, run_round_robin, SimLedger, TurnReport};

const DEFAULT_CONFIG: &str = "warden.toml";

// ── CLI definition ────────────────────────────────────────────────────────────

/// WARDEN: policy-guarded agent wallets.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "WARDEN reference runtime demo",
    long_about = "Runs WARDEN agents round-robin against an in-process devnet,\n\
                  showing policy enforcement, simulate-then-commit execution,\n\
                  encrypted key custody and the JSONL audit log."
)]
struct Cli {
    /// Runtime configuration file. Defaults to ./warden.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision and fund every agent, then run round-robin cycles.
    Run {
        /// Stop every execution after a successful simulation.
        #[arg(long)]
        simulate_only: bool,
        #[arg(long, default_value_t = 1)]
        rounds: usize,
        /// SOL airdropped to each agent on the devnet before the first round.
        #[arg(long, default_value = "1")]
        airdrop_sol: Decimal,
    },
    /// List configured agents with their address, strategy and spend cap.
    Agents,
    /// Print an agent's address, creating its key on first use.
    Address {
        #[arg(long)]
        agent: String,
    },
    /// Create and encrypt a key for a new agent. Never overwrites.
    CreateAgent {
        #[arg(long)]
        id: String,
    },
    /// Print an agent's policy file as loaded.
    Policy {
        #[arg(long)]
        id: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for the full pipeline trace.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::Run {
                simulate_only,
                rounds,
                airdrop_sol,
            } => run(config, simulate_only, rounds, airdrop_sol).await,
            Command::Agents => agents(&config),
            Command::Address { agent } => address(&config, &AgentId::new(agent)),
            Command::CreateAgent { id } => create_agent(&config, &AgentId::new(id)),
            Command::Policy { id } => policy(&config, &AgentId::new(id)),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {e}");
        std::process::exit(1);
    }
}

fn load_config(explicit: Option<&Path>) -> WardenResult<RuntimeConfig> {
    match explicit {
        Some(path) => RuntimeConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => RuntimeConfig::from_file(Path::new(DEFAULT_CONFIG)),
        None => Ok(RuntimeConfig::default()),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run(
    mut config: RuntimeConfig,
    simulate_only: bool,
    rounds: usize,
    airdrop_sol: Decimal,
) -> WardenResult<()> {
    config.simulate_only |= simulate_only;
    let passphrase = config.passphrase()?;
    let system = AgentId::new("system");

    let run_id = new_run_id();
    let audit = Arc::new(JsonlAuditSink::create(&config.logs_dir, &run_id)?);
    audit.write(AuditEvent::new(&system, "starting demo").with_extra(json!({
        "runId": run_id,
        "simulateOnly": config.simulate_only,
        "rounds": rounds,
    })));

    let specs = load_dir(&config.agents_dir)?;
    let store = KeyStore::new(&config.keys_dir);
    let participants = provision(&specs, &store, &passphrase, audit.as_ref())?;

    let ledger = Arc::new(SimLedger::new());
    let airdrop = sol_to_lamports(airdrop_sol)?;
    for p in &participants {
        ledger.airdrop(&p.agent.address(), airdrop);
    }

    let counter = match &config.idl_path {
        Some(path) => CounterClient::new(COUNTER_PROGRAM_ID).with_idl(ProgramIdl::from_file(path)?),
        None => CounterClient::reference()?,
    };
    let engine = ExecutionEngine::builder()
        .ledger(ledger.clone())
        .audit(audit.clone())
        .counter_client(counter)
        .config(config.engine_config())
        .build()?;

    info!(run_id = %run_id, agents = participants.len(), rounds, "starting round-robin");
    let reports = run_round_robin(&engine, &participants, &reference_registry(), rounds).await?;

    println!();
    println!("WARDEN round-robin  run {run_id}{}", if config.simulate_only { "  (simulate-only)" } else { "" });
    println!("==========================================");
    for report in &reports {
        print_turn(report);
    }
    println!();
    println!("Final balances:");
    for p in &participants {
        println!(
            "  {:<12} {:>14} SOL  {}",
            p.agent.id().to_string(),
            lamports_to_sol(ledger.balance(&p.agent.address())).to_string(),
            p.agent.address()
        );
    }

    audit.write(
        AuditEvent::new(&system, "done").with_extra(json!({ "logFile": audit.path().display().to_string() })),
    );
    println!();
    println!("Audit log: {}", audit.path().display());
    Ok(())
}

fn agents(config: &RuntimeConfig) -> WardenResult<()> {
    let store = KeyStore::new(&config.keys_dir);
    let passphrase = config.passphrase()?;
    for spec in load_dir(&config.agents_dir)? {
        let address = if store.exists(&spec.id)? {
            store.load(&spec.id, &passphrase)?.address().to_string()
        } else {
            "(no key yet)".to_string()
        };
        println!(
            "{:<12} cap {:>8} SOL  {:<18} {address}",
            spec.id.to_string(),
            spec.spend_cap.to_string(),
            spec.strategy
        );
    }
    Ok(())
}

fn address(config: &RuntimeConfig, agent_id: &AgentId) -> WardenResult<()> {
    require_configured(config, agent_id)?;
    let store = KeyStore::new(&config.keys_dir);
    let (material, created) = store.load_or_create(agent_id, &config.passphrase()?)?;
    if created {
        eprintln!("created key for {agent_id}");
    }
    println!("{}", material.address());
    Ok(())
}

fn create_agent(config: &RuntimeConfig, agent_id: &AgentId) -> WardenResult<()> {
    let store = KeyStore::new(&config.keys_dir);
    let material = store.create(agent_id, &config.passphrase()?)?;
    println!("created {agent_id}: {}", material.address());
    Ok(())
}

fn policy(config: &RuntimeConfig, agent_id: &AgentId) -> WardenResult<()> {
    let spec = find_spec(config, agent_id)?;
    let recipients: Vec<String> = spec
        .allow_recipients
        .iter()
        .map(|r| match r {
            RecipientRef::Address(address) => address.to_string(),
            RecipientRef::Agent(id) => format!("agent:{id}"),
        })
        .collect();
    let rendered = json!({
        "id": spec.id,
        "spendCapSol": spec.spend_cap,
        "allowRecipients": recipients,
        "allowPrograms": spec.allow_programs,
        "strategy": spec.strategy,
    });
    println!("{}", serde_json::to_string_pretty(&rendered).unwrap_or_else(|_| rendered.to_string()));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_configured(config: &RuntimeConfig, agent_id: &AgentId) -> WardenResult<()> {
    if list_agent_ids(&config.agents_dir)?.contains(agent_id) {
        Ok(())
    } else {
        Err(WardenError::Config {
            reason: format!(
                "no policy file for agent '{agent_id}' in '{}'",
                config.agents_dir.display()
            ),
        })
    }
}

fn find_spec(config: &RuntimeConfig, agent_id: &AgentId) -> WardenResult<AgentSpec> {
    load_dir(&config.agents_dir)?
        .into_iter()
        .find(|s| &s.id == agent_id)
        .ok_or_else(|| WardenError::Config {
            reason: format!(
                "no policy file for agent '{agent_id}' in '{}'",
                config.agents_dir.display()
            ),
        })
}

fn print_turn(report: &TurnReport) {
    let head = format!(
        "[round {}] {} -> {} ({})",
        report.round + 1,
        report.agent_id,
        report.target,
        report.strategy
    );
    match &report.result {
        Ok(ExecutionOutcome::Skipped { reason, .. }) => {
            println!("{head}: skipped, {}", reason.as_deref().unwrap_or("no reason given"));
        }
        Ok(ExecutionOutcome::Simulated { details, .. }) => {
            println!("{head}: simulated only, {}", describe(details));
        }
        Ok(ExecutionOutcome::Committed { signature, details, .. }) => {
            println!("{head}: committed {signature}, {}", describe(details));
        }
        Err(e) => println!("{head}: FAILED, {e}"),
    }
}

fn describe(details: &OutcomeDetails) -> String {
    match details {
        OutcomeDetails::Transfer { to, lamports, .. } => {
            format!("{} SOL to {to}", lamports_to_sol(*lamports))
        }
        OutcomeDetails::Counter { action, before, after, .. } => {
            let show = |v: &Option<u64>| v.map_or_else(|| "?".to_string(), |n| n.to_string());
            format!("counter {action} ({} -> {})", show(before), show(after))
        }
    }
}
