//! Inbox intake: admit dropped files into `Needs_Action`.
//!
//! Each admitted item gets a companion `<stem>_trigger.md` whose YAML front
//! matter records where the item came from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use taskvault_core::fsops::split_name;
use taskvault_core::{Stage, StageStore, VaultError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::shutdown::ShutdownSignal;
use crate::watcher::WatchEvent;

/// Front matter of a trigger file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMeta {
    pub filename: String,
    pub size: u64,
    pub timestamp: String,
    pub original_path: String,
}

#[derive(Debug, Clone)]
pub struct Admitted {
    pub item: PathBuf,
    pub trigger: PathBuf,
}

pub struct Intake {
    store: Arc<dyn StageStore>,
}

impl Intake {
    pub fn new(store: Arc<dyn StageStore>) -> Self {
        Self { store }
    }

    /// Move `path` from `Inbox` to `Needs_Action` and write its trigger file.
    pub fn admit(&self, path: &Path) -> Result<Admitted, WatchError> {
        let layout = self.store.layout();
        if layout.stage_of(path) != Some(Stage::Inbox) {
            return Err(WatchError::OutsideStage(path.display().to_string()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::InvalidName(path.display().to_string()))?;

        let size = std::fs::metadata(path)?.len();
        let item = self
            .store
            .transition(name, Stage::Inbox, Stage::NeedsAction)?;
        let item_name = item
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name)
            .to_string();

        let meta = TriggerMeta {
            filename: item_name.clone(),
            size,
            timestamp: Local::now().to_rfc3339(),
            original_path: path.display().to_string(),
        };
        let (stem, _) = split_name(&item_name);
        let trigger = self.store.write_new(
            Stage::NeedsAction,
            &format!("{}_trigger.md", stem),
            &render_trigger(&meta)?,
        )?;

        info!(
            item = %item.display(),
            trigger = %trigger.display(),
            "Admitted item from Inbox"
        );
        Ok(Admitted { item, trigger })
    }
}

fn render_trigger(meta: &TriggerMeta) -> Result<String, WatchError> {
    let yaml = serde_yaml::to_string(meta)
        .map_err(|e| WatchError::Producer(format!("trigger front matter: {}", e)))?;
    Ok(format!(
        "---\n{}---\n\n# New item: {}\n\nMoved from Inbox for processing.\n",
        yaml, meta.filename
    ))
}

/// Parse the front matter of a trigger file, if it has one.
pub fn parse_front_matter(content: &str) -> Option<TriggerMeta> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    serde_yaml::from_str(&rest[..end]).ok()
}

/// Drain watcher events into [`Intake::admit`] until shutdown.
///
/// Failures are logged per item; the loop never stops on a bad item.
pub async fn run_intake(
    mut events: mpsc::Receiver<WatchEvent>,
    intake: Intake,
    shutdown: ShutdownSignal,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = shutdown.wait() => break,
        };
        let Some(event) = event else {
            debug!("Watcher channel closed, stopping intake");
            break;
        };

        match intake.admit(&event.path) {
            Ok(_) => {}
            Err(WatchError::OutsideStage(path)) => {
                debug!(path = %path, "Ignoring event outside Inbox");
            }
            Err(e) if e.is_transient() => {
                warn!(path = %event.path.display(), error = %e, "Intake skipped, will retry on next event");
            }
            Err(e) => {
                warn!(path = %event.path.display(), error = %e, "Intake failed");
            }
        }
    }
    info!("Intake stopped");
}
