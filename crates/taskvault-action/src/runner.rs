//! Periodic pass over `Approved`.
//!
//! Each `*.md`/`*.txt` file is read, claimed by moving it to `Done`, then
//! executed. Claiming first means a file is executed at most once even when
//! the side effect fails or the process dies mid-call; failures surface in the
//! audit log for the operator to resubmit.

use std::sync::Arc;
use std::time::Duration;

use taskvault_core::{Stage, StageStore, VaultError};
use taskvault_watch::ShutdownSignal;
use tracing::{debug, info, warn};

use crate::error::ActionError;
use crate::executor::Executor;

/// Extensions picked up from `Approved`.
pub const ACTION_EXTENSIONS: &[&str] = &["md", "txt"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct ApprovedRunner {
    store: Arc<dyn StageStore>,
    executor: Arc<Executor>,
    interval: Duration,
}

fn is_action_file(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ACTION_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl ApprovedRunner {
    pub fn new(store: Arc<dyn StageStore>, executor: Arc<Executor>, interval: Duration) -> Self {
        Self {
            store,
            executor,
            interval,
        }
    }

    pub async fn run_once(&self) -> RunReport {
        let mut report = RunReport::default();
        let names = match self.store.list(Stage::Approved) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Cannot list Approved, skipping pass");
                return report;
            }
        };

        for name in names.iter().filter(|n| is_action_file(n)) {
            let content = match self.store.read(Stage::Approved, name) {
                Ok(content) => Ok(content),
                Err(e) if e.is_transient() => {
                    debug!(file = %name, error = %e, "Action file not readable yet");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => Err(e),
            };

            match self.store.transition(name, Stage::Approved, Stage::Done) {
                Ok(dest) => debug!(file = %name, to = %dest.display(), "Action file claimed"),
                Err(VaultError::NotFound { .. }) => {
                    debug!(file = %name, "Action file claimed elsewhere");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Cannot claim action file, leaving it");
                    report.skipped += 1;
                    continue;
                }
            }

            let result = match content {
                Ok(content) => self.executor.execute_content(&content).await,
                Err(e) => self.executor.reject_unreadable(ActionError::Vault(e)),
            };

            if result.is_success() {
                info!(file = %name, action_type = %result.action_type, "Action executed");
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        if report != RunReport::default() {
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                "Executor pass complete"
            );
        }
        report
    }

    pub async fn run(&self, shutdown: ShutdownSignal) {
        info!(interval_secs = self.interval.as_secs(), "Executor loop started");
        while shutdown.is_running() {
            self.run_once().await;
            if !shutdown.sleep_or_shutdown(self.interval).await {
                break;
            }
        }
        info!("Executor loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::handler::ActionRegistry;
    use taskvault_core::config::AuditConfig;
    use taskvault_core::{FsStageStore, VaultLayout};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<FsStageStore>, ApprovedRunner, Arc<AuditLog>) {
        let dir = TempDir::new().unwrap();
        let layout = VaultLayout::new(dir.path());
        layout.ensure().unwrap();
        let store = Arc::new(FsStageStore::new(layout));
        let audit = Arc::new(AuditLog::new(&AuditConfig::default()));
        let executor = Arc::new(Executor::new(ActionRegistry::new(), audit.clone()));
        let runner = ApprovedRunner::new(store.clone(), executor, Duration::from_millis(20));
        (dir, store, runner, audit)
    }

    #[test]
    fn test_is_action_file() {
        assert!(is_action_file("APPROVAL_x.txt"));
        assert!(is_action_file("reply.MD"));
        assert!(!is_action_file("invoice.pdf"));
        assert!(!is_action_file("noext"));
    }

    #[tokio::test]
    async fn test_malformed_file_still_archived() {
        let (_dir, store, runner, audit) = setup();
        store
            .write_new(Stage::Approved, "broken.md", "no fields here at all")
            .unwrap();

        let report = runner.run_once().await;
        assert_eq!(report.failed, 1);
        assert!(store.list(Stage::Approved).unwrap().is_empty());
        assert_eq!(store.list(Stage::Done).unwrap(), vec!["broken.md"]);

        let entry = &audit.recent(1)[0];
        assert_eq!(entry.action_type, "unparsed");
        assert!(!entry.success);
    }

    #[tokio::test]
    async fn test_other_extensions_ignored() {
        let (_dir, store, runner, audit) = setup();
        store
            .write_new(Stage::Approved, "scan.pdf", "type: email_send")
            .unwrap();

        assert_eq!(runner.run_once().await, RunReport::default());
        assert_eq!(store.list(Stage::Approved).unwrap(), vec!["scan.pdf"]);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_non_utf8_file_archived_and_audited() {
        let (_dir, store, runner, audit) = setup();
        let path = store.layout().path_of(Stage::Approved, "binary.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();

        let report = runner.run_once().await;
        assert_eq!(report.failed, 1);
        assert_eq!(store.list(Stage::Done).unwrap(), vec!["binary.txt"]);
        assert!(!audit.recent(1)[0].success);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (_dir, _store, runner, _audit) = setup();
        let shutdown = ShutdownSignal::new();
        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { runner.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
