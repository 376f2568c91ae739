//! In-memory implementation of `AuditSink`.
//!
//! `InMemoryAuditSink` keeps every record in a `Vec` behind a `Mutex`, so
//! one sink can be shared by concurrently executing agents. Each record is
//! chained to the previous one at write time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;
use warden_contracts::agent::AgentId;
use warden_core::traits::{AuditEvent, AuditSink};

use crate::{
    chain::{hash_record, verify_chain},
    event::{AuditLog, AuditRecord},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    pub(crate) records: Vec<AuditRecord>,
    /// `this_hash` of the last record, or `GENESIS_HASH` before any write.
    pub(crate) last_hash: String,
}

// ── Public sink ───────────────────────────────────────────────────────────────

/// An append-only audit sink backed by a SHA-256 hash chain.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    run_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditSink {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: Arc::new(Mutex::new(InMemoryState {
                records: Vec::new(),
                last_hash: AuditRecord::GENESIS_HASH.to_string(),
            })),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// A poisoned lock only means another writer panicked mid-push; the
    /// records written so far are still intact.
    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every record in chain order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().records.clone()
    }

    /// Messages written for `agent_id`, in order.
    pub fn messages_for(&self, agent_id: &AgentId) -> Vec<String> {
        self.lock()
            .records
            .iter()
            .filter(|r| &r.agent_id == agent_id)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Export a sealed `AuditLog` of everything written so far.
    pub fn export_log(&self) -> AuditLog {
        let state = self.lock();
        AuditLog {
            run_id: self.run_id.clone(),
            records: state.records.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .records
                .last()
                .map(|r| r.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    /// Recheck linkage and hashes of every record held in memory.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.lock().records)
    }
}

// ── AuditSink impl ────────────────────────────────────────────────────────────

impl AuditSink for InMemoryAuditSink {
    fn write(&self, event: AuditEvent) {
        let mut state = self.lock();
        let mut record = AuditRecord {
            sequence: state.records.len() as u64,
            run_id: self.run_id.clone(),
            timestamp: Utc::now(),
            agent_id: event.agent_id,
            message: event.message,
            extra: event.extra,
            prev_hash: state.last_hash.clone(),
            this_hash: String::new(),
        };
        record.this_hash = hash_record(&record);
        debug!(
            run_id = %self.run_id,
            sequence = record.sequence,
            agent_id = %record.agent_id,
            message = %record.message,
            "audit record appended"
        );
        state.last_hash = record.this_hash.clone();
        state.records.push(record);
    }
}
