//! # warden-policy
//!
//! Deny-by-default guardrails for WARDEN agents.
//!
//! ## Overview
//!
//! Every intent passes through the checks in [`checks`] before it is
//! compiled into a transaction:
//!
//! - [`check_spend_cap`]: the amount may not exceed the agent's cap.
//! - [`check_recipient`]: the recipient must be allow-listed.
//! - [`check_programs`]: every program the transaction invokes must be
//!   allow-listed.
//!
//! An empty allow-list allows nothing. Addresses are compared in canonical
//! form, so the encoding a caller used never changes the verdict.
//!
//! ## Policy files
//!
//! [`config`] loads per-agent policy files (JSON or TOML) from an agents
//! directory and turns them into validated `Policy` values.
//!
//! ```rust,ignore
//! use std::path::Path;
//! use warden_policy::config::load_dir;
//!
//! let specs = load_dir(Path::new("agents"))?;
//! ```

pub mod checks;
pub mod config;

pub use checks::{check_programs, check_recipient, check_spend_cap, normalize, Principal};
pub use config::{load_dir, AgentSpec, RecipientRef};

// ── Tests ─────────────────────────────────────────────────────────────────────
