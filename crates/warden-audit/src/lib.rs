//! # warden-audit
//!
//! Audit sinks for the WARDEN runtime.
//!
//! - `InMemoryAuditSink`: append-only, SHA-256 hash-chained records. Any
//!   change to a stored record breaks the chain and is detected by
//!   `verify_chain`.
//! - `JsonlAuditSink`: one JSON object per line in a per-run file, the
//!   operator-facing log.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_audit::{InMemoryAuditSink, JsonlAuditSink, new_run_id};
//!
//! let run_id = new_run_id();
//! let sink = JsonlAuditSink::create(&config.logs_dir, &run_id)?;
//! let engine = ExecutionEngine::builder().audit(Arc::new(sink)) /* .. */;
//! ```

pub mod chain;
pub mod event;
pub mod jsonl;
pub mod memory;

pub use chain::{hash_record, verify_chain};
pub use event::{AuditLog, AuditRecord};
pub use jsonl::{make_run_id, new_run_id, JsonlAuditSink};
pub use memory::InMemoryAuditSink;

// ── Tests ─────────────────────────────────────────────────────────────────────
