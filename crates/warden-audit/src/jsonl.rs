//! JSON-lines file sink.
//!
//! One file per run, `run-<run id>.jsonl`, each line
//! `{"t": .., "runId": .., "agentId": .., "msg": .., "extra": ..}`.
//! A line is formatted in full and written with a single `write_all` while
//! the file lock is held, so concurrent agents never interleave.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use warden_contracts::error::{WardenError, WardenResult};
use warden_core::traits::{AuditEvent, AuditSink};

/// `YYYYMMDD-HHMMSS` for `at`.
pub fn make_run_id(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// A run id for the current instant.
pub fn new_run_id() -> String {
    make_run_id(Utc::now())
}

pub struct JsonlAuditSink {
    run_id: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open `dir/run-<run_id>.jsonl` for appending, creating `dir` if needed.
    pub fn create(dir: &Path, run_id: &str) -> WardenResult<Self> {
        fs::create_dir_all(dir).map_err(|e| WardenError::Config {
            reason: format!("failed to create log directory '{}': {e}", dir.display()),
        })?;
        let path = dir.join(format!("run-{run_id}.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WardenError::Config {
                reason: format!("failed to open audit log '{}': {e}", path.display()),
            })?;
        debug!(run_id, path = %path.display(), "audit log opened");
        Ok(Self {
            run_id: run_id.to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line(&self, event: &AuditEvent) -> String {
        let mut line = json!({
            "t": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "runId": self.run_id,
            "agentId": event.agent_id,
            "msg": event.message,
        });
        if let (Some(extra), Value::Object(map)) = (&event.extra, &mut line) {
            map.insert("extra".to_string(), extra.clone());
        }
        let mut text = line.to_string();
        text.push('\n');
        text
    }
}

impl AuditSink for JsonlAuditSink {
    fn write(&self, event: AuditEvent) {
        let line = self.line(&event);
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(
                path = %self.path.display(),
                agent_id = %event.agent_id,
                error = %e,
                "failed to append audit line"
            );
        }
    }
}
