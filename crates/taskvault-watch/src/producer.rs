//! Periodic pass over `Needs_Action`.
//!
//! Every `*.md` item goes through the dedup gate. Duplicates are archived to
//! `Done` straight away; new items are handed to the plan producer and
//! archived once their artifacts exist. Items that fail stay put for the next
//! pass.

use std::sync::Arc;
use std::time::Duration;

use taskvault_core::{Stage, StageStore};
use tracing::{debug, info, warn};

use crate::dedup::DedupGate;
use crate::planner::{task_from_item, PlanProducer};
use crate::shutdown::ShutdownSignal;

/// Outcome counts for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub planned: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

pub struct ProducerLoop {
    store: Arc<dyn StageStore>,
    gate: DedupGate,
    producer: Arc<dyn PlanProducer>,
    interval: Duration,
}

impl ProducerLoop {
    pub fn new(
        store: Arc<dyn StageStore>,
        producer: Arc<dyn PlanProducer>,
        interval: Duration,
    ) -> Self {
        Self {
            gate: DedupGate::new(Arc::clone(&store)),
            store,
            producer,
            interval,
        }
    }

    /// Process everything currently in `Needs_Action`.
    pub async fn run_once(&self) -> PassReport {
        let mut report = PassReport::default();
        let names = match self.store.list(Stage::NeedsAction) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Cannot list Needs_Action, skipping pass");
                return report;
            }
        };

        for name in names.iter().filter(|n| n.ends_with(".md")) {
            let path = self.store.layout().path_of(Stage::NeedsAction, name);

            match self.gate.should_process(&path) {
                Ok(true) => {}
                Ok(false) => {
                    match self.store.transition(name, Stage::NeedsAction, Stage::Done) {
                        Ok(_) => report.duplicates += 1,
                        Err(e) => {
                            warn!(item = %name, error = %e, "Cannot archive duplicate");
                            report.skipped += 1;
                        }
                    }
                    continue;
                }
                Err(e) => {
                    warn!(item = %name, error = %e, "Dedup check failed, leaving item");
                    report.skipped += 1;
                    continue;
                }
            }

            let content = match self.store.read(Stage::NeedsAction, name) {
                Ok(content) => content,
                Err(e) => {
                    if e.is_transient() {
                        debug!(item = %name, error = %e, "Item not readable yet");
                    } else {
                        warn!(item = %name, error = %e, "Cannot read item");
                    }
                    report.skipped += 1;
                    continue;
                }
            };

            let mut task = task_from_item(&path, &content);
            if let Err(e) = self.producer.produce(&mut task).await {
                warn!(item = %name, error = %e, "Plan production failed, leaving item");
                report.skipped += 1;
                continue;
            }

            match self.store.transition(name, Stage::NeedsAction, Stage::Done) {
                Ok(dest) => {
                    info!(item = %name, to = %dest.display(), "Task planned and archived");
                    report.planned += 1;
                }
                Err(e) => {
                    // The plan exists now, so the next pass archives this as a duplicate.
                    warn!(item = %name, error = %e, "Cannot archive planned task");
                    report.skipped += 1;
                }
            }
        }

        if report != PassReport::default() {
            info!(
                planned = report.planned,
                duplicates = report.duplicates,
                skipped = report.skipped,
                "Producer pass complete"
            );
        }
        report
    }

    pub async fn run(&self, shutdown: ShutdownSignal) {
        info!(interval_secs = self.interval.as_secs(), "Producer loop started");
        while shutdown.is_running() {
            self.run_once().await;
            if !shutdown.sleep_or_shutdown(self.interval).await {
                break;
            }
        }
        info!("Producer loop stopped");
    }
}
