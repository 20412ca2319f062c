//! Audit trail of executed actions.
//!
//! Every execution attempt, successful or not, leaves one [`AuditEntry`].
//! Entries live in a bounded in-memory log; when it grows past the limit the
//! oldest half is dropped. If a JSONL path is configured each entry is also
//! appended there as one JSON object per line. That write is best-effort: a
//! failure is logged and the in-memory record still stands.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskvault_core::config::AuditConfig;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub success: bool,
    pub summary: String,
}

pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    max_entries: usize,
    summary_chars: usize,
    jsonl: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: config.max_entries.max(2),
            summary_chars: config.summary_chars,
            jsonl: None,
        }
    }

    /// Also persist entries to `path`, one JSON object per line.
    pub fn with_jsonl(mut self, path: impl Into<PathBuf>) -> Self {
        self.jsonl = Some(path.into());
        self
    }

    pub fn record(&self, action_type: &str, success: bool, summary: &str) -> AuditEntry {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            action_type: action_type.to_string(),
            success,
            summary: summary.chars().take(self.summary_chars).collect(),
        };

        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push_back(entry.clone());
            if entries.len() > self.max_entries {
                let keep = self.max_entries / 2;
                let drop = entries.len() - keep;
                entries.drain(..drop);
            }
        }

        if let Some(path) = &self.jsonl {
            if let Err(e) = append_line(path, &entry) {
                warn!(path = %path.display(), error = %e, "Failed to persist audit entry");
            }
        }

        tracing::info!(
            action_type = %entry.action_type,
            success = entry.success,
            "Audit entry recorded"
        );
        entry
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn append_line(path: &Path, entry: &AuditEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", line)
}
