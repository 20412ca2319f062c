//! Human approval gate.
//!
//! Two protocols share one gate:
//!
//! - **Status field**: a JSON [`ApprovalRequest`] is written to
//!   `Pending_Approval` and its `status` field is polled until a human edits
//!   it to `approved` or `rejected`.
//! - **Relocation**: an artifact is written to `Pending_Approval` and the
//!   human moves it to `Approved`. Location is the only signal; no field in
//!   the file is trusted. Copies of the artifact that already sat in
//!   `Approved` or `Done` when it was submitted never count.
//!
//! Both waits are bounded by the configured timeout plus at most one poll
//! interval, and return early on shutdown. A timeout is "not approved": the
//! caller leaves the originating task where it was.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use taskvault_core::config::ApprovalConfig;
use taskvault_core::fsops::split_name;
use taskvault_core::{ApprovalRequest, ApprovalStatus, Stage, StageStore};
use taskvault_watch::ShutdownSignal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ApprovalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    TimedOut,
    /// Shutdown arrived while waiting.
    Cancelled,
}

impl ApprovalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalOutcome::Approved)
    }
}

/// An artifact handed to the relocation protocol.
#[derive(Debug, Clone)]
pub struct Submission {
    /// File name in `Pending_Approval`.
    pub name: String,
    baseline: BTreeSet<(Stage, String)>,
}

pub struct ApprovalGate {
    store: Arc<dyn StageStore>,
    timeout: Duration,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn StageStore>, config: &ApprovalConfig, shutdown: ShutdownSignal) -> Self {
        Self::with_timing(store, config.timeout(), config.poll_interval(), shutdown)
    }

    pub fn with_timing(
        store: Arc<dyn StageStore>,
        timeout: Duration,
        poll_interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            shutdown,
        }
    }

    /// Write a status-field request. Returns the file name in `Pending_Approval`.
    pub fn request(&self, request: &ApprovalRequest) -> Result<String, ApprovalError> {
        let json = serde_json::to_string_pretty(request)?;
        let path = self
            .store
            .write_new(Stage::PendingApproval, &request.file_name(), &json)?;
        let name = file_name_of(&path);
        info!(id = %request.id, file = %name, "Approval requested");
        Ok(name)
    }

    /// Write a relocation-protocol artifact.
    pub fn submit(&self, name: &str, content: &str) -> Result<Submission, ApprovalError> {
        let path = self.store.write_new(Stage::PendingApproval, name, content)?;
        let name = file_name_of(&path);
        let baseline = self.copies_of(&name);
        info!(file = %name, preexisting = baseline.len(), "Artifact awaiting approval");
        Ok(Submission { name, baseline })
    }

    /// Poll the request's status field.
    pub async fn wait_for_status(&self, name: &str) -> ApprovalOutcome {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.read_status(name) {
                Some(ApprovalStatus::Approved) => return ApprovalOutcome::Approved,
                Some(ApprovalStatus::Rejected) | Some(ApprovalStatus::Expired) => {
                    return ApprovalOutcome::Rejected
                }
                _ => {}
            }
            match self.pause(deadline).await {
                Some(outcome) => {
                    if outcome == ApprovalOutcome::TimedOut {
                        self.mark_expired(name);
                    }
                    return outcome;
                }
                None => continue,
            }
        }
    }

    /// Poll for the artifact leaving `Pending_Approval`.
    ///
    /// Once it has left, a new copy in `Approved` or `Done` means approved
    /// (the executor may already have consumed it, possibly under a suffixed
    /// name); no new copy means rejected.
    pub async fn wait_for_relocation(&self, submission: &Submission) -> ApprovalOutcome {
        let name = submission.name.as_str();
        let deadline = Instant::now() + self.timeout;
        loop {
            if !self.exists(Stage::PendingApproval, name) {
                let arrived = self
                    .copies_of(name)
                    .into_iter()
                    .any(|copy| !submission.baseline.contains(&copy));
                if arrived {
                    info!(file = %name, "Artifact approved");
                    return ApprovalOutcome::Approved;
                }
                info!(file = %name, "Artifact removed without approval");
                return ApprovalOutcome::Rejected;
            }
            if let Some(outcome) = self.pause(deadline).await {
                return outcome;
            }
        }
    }

    /// Sleep one poll step. `Some` ends the wait.
    async fn pause(&self, deadline: Instant) -> Option<ApprovalOutcome> {
        let now = Instant::now();
        if now >= deadline {
            warn!(timeout_secs = self.timeout.as_secs(), "Approval wait timed out");
            return Some(ApprovalOutcome::TimedOut);
        }
        let step = self.poll_interval.min(deadline - now);
        if !self.shutdown.sleep_or_shutdown(step).await {
            return Some(ApprovalOutcome::Cancelled);
        }
        None
    }

    fn exists(&self, stage: Stage, name: &str) -> bool {
        self.store.layout().path_of(stage, name).is_file()
    }

    /// Files in `Approved` and `Done` named `name` or a collision-suffixed
    /// variant of it.
    fn copies_of(&self, name: &str) -> BTreeSet<(Stage, String)> {
        let (stem, ext) = split_name(name);
        let prefix = format!("{}_", stem);
        let mut copies = BTreeSet::new();
        for stage in [Stage::Approved, Stage::Done] {
            let entries = match self.store.list(stage) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(stage = %stage, error = %e, "Cannot list stage");
                    continue;
                }
            };
            copies.extend(
                entries
                    .into_iter()
                    .filter(|n| n == name || is_suffixed_copy(n, &prefix, ext))
                    .map(|n| (stage, n)),
            );
        }
        copies
    }

    fn read_status(&self, name: &str) -> Option<ApprovalStatus> {
        let text = match self.store.read(Stage::PendingApproval, name) {
            Ok(text) => text,
            Err(e) => {
                debug!(file = %name, error = %e, "Approval request unreadable");
                return None;
            }
        };
        match serde_json::from_str::<ApprovalRequest>(&text) {
            Ok(request) => Some(request.status),
            Err(e) => {
                debug!(file = %name, error = %e, "Approval request not parseable yet");
                None
            }
        }
    }

    fn mark_expired(&self, name: &str) {
        let path = self.store.layout().path_of(Stage::PendingApproval, name);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return;
        };
        let Ok(mut request) = serde_json::from_str::<ApprovalRequest>(&text) else {
            return;
        };
        request.status = ApprovalStatus::Expired;
        let written = serde_json::to_string_pretty(&request)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&path, json));
        if let Err(e) = written {
            warn!(file = %name, error = %e, "Failed to mark approval expired");
        }
    }
}

/// `<stem>_<timestamp>[_<n>]<ext>`, as produced on a name collision.
fn is_suffixed_copy(candidate: &str, prefix: &str, ext: &str) -> bool {
    candidate
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(ext))
        .is_some_and(|suffix| {
            suffix.starts_with(|c: char| c.is_ascii_digit())
                && suffix.chars().all(|c| c.is_ascii_digit() || c == '_')
        })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
