//! Polling directory watcher.
//!
//! Each scan walks the watched roots and diffs the result against the
//! previous snapshot. New paths are qualified in the background (grace
//! sleep, stability, non-empty) and then published on a bounded channel.
//! Only creations and moves are reported; modifications and deletions are
//! not events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taskvault_core::config::WatcherConfig;
use taskvault_core::Stage;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::shutdown::ShutdownSignal;
use crate::stability::StabilityDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Created,
    Moved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
    /// Previous location, for moves between watched paths.
    pub from: Option<PathBuf>,
}

/// Identity of a file that survives a rename.
type FileKey = (u64, u64);

#[cfg(unix)]
fn file_key(meta: &std::fs::Metadata) -> Option<FileKey> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_key(_meta: &std::fs::Metadata) -> Option<FileKey> {
    None
}

pub struct DirectoryWatcher {
    roots: Vec<PathBuf>,
    restricted: Vec<String>,
    scan_interval: Duration,
    grace: Duration,
    capacity: usize,
    stability: StabilityDetector,
}

impl DirectoryWatcher {
    /// Watch `roots`, skipping the pipeline's own output directories.
    pub fn new(roots: Vec<PathBuf>, config: &WatcherConfig, stability: StabilityDetector) -> Self {
        Self {
            roots,
            restricted: Stage::restricted()
                .iter()
                .map(|s| s.dir_name().to_string())
                .collect(),
            scan_interval: Duration::from_millis(config.scan_interval_ms),
            grace: Duration::from_millis(config.grace_ms),
            capacity: config.channel_capacity.max(1),
            stability,
        }
    }

    /// Create the roots and start the scan loop on its own task.
    pub fn spawn(
        self,
        shutdown: ShutdownSignal,
    ) -> Result<(mpsc::Receiver<WatchEvent>, JoinHandle<()>), WatchError> {
        for root in &self.roots {
            std::fs::create_dir_all(root)?;
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        let handle = tokio::spawn(async move { self.run(tx, shutdown).await });
        Ok((rx, handle))
    }

    /// Scan until shutdown or until the receiver goes away.
    pub async fn run(self, tx: mpsc::Sender<WatchEvent>, shutdown: ShutdownSignal) {
        info!(roots = ?self.roots, "Directory watcher started");
        let mut known: HashMap<PathBuf, Option<FileKey>> = HashMap::new();
        let mut in_flight = JoinSet::new();

        while shutdown.is_running() {
            if tx.is_closed() {
                debug!("Event receiver dropped, stopping watcher");
                break;
            }
            while in_flight.try_join_next().is_some() {}

            let current = self.scan();
            let vanished: HashMap<FileKey, PathBuf> = known
                .iter()
                .filter(|(path, _)| !current.contains_key(*path))
                .filter_map(|(path, key)| key.map(|k| (k, path.clone())))
                .collect();

            for (path, key) in &current {
                if known.contains_key(path) {
                    continue;
                }
                let from = key.and_then(|k| vanished.get(&k).cloned());
                let event = WatchEvent {
                    kind: if from.is_some() {
                        WatchEventKind::Moved
                    } else {
                        WatchEventKind::Created
                    },
                    path: path.clone(),
                    from,
                };
                in_flight.spawn(qualify(
                    event,
                    self.grace,
                    self.stability.clone(),
                    tx.clone(),
                ));
            }
            known = current;

            if !shutdown.sleep_or_shutdown(self.scan_interval).await {
                break;
            }
        }

        in_flight.abort_all();
        info!("Directory watcher stopped");
    }

    fn scan(&self) -> HashMap<PathBuf, Option<FileKey>> {
        let mut files = HashMap::new();
        for root in &self.roots {
            let mut pending = vec![root.clone()];
            while let Some(dir) = pending.pop() {
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Cannot read directory, skipping");
                        continue;
                    }
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if self.is_restricted(root, &path) {
                        continue;
                    }
                    let meta = match entry.metadata() {
                        Ok(meta) => meta,
                        Err(e) => {
                            debug!(path = %path.display(), error = %e, "Entry vanished during scan");
                            continue;
                        }
                    };
                    if meta.is_dir() {
                        pending.push(path);
                    } else if meta.is_file() {
                        files.insert(path, file_key(&meta));
                    }
                }
            }
        }
        files
    }

    fn is_restricted(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| self.restricted.iter().any(|r| r == name))
        })
    }
}

async fn qualify(
    event: WatchEvent,
    grace: Duration,
    stability: StabilityDetector,
    tx: mpsc::Sender<WatchEvent>,
) {
    tokio::time::sleep(grace).await;

    if !stability.await_stable(&event.path).await {
        debug!(path = %event.path.display(), "File gone before it settled");
        return;
    }

    match tokio::fs::metadata(&event.path).await {
        Ok(meta) if meta.len() == 0 => {
            debug!(path = %event.path.display(), "Skipping empty file");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(path = %event.path.display(), error = %e, "Cannot stat new file, skipping");
            return;
        }
    }

    debug!(kind = ?event.kind, path = %event.path.display(), "Forwarding watch event");
    if tx.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            scan_interval_ms: 10,
            grace_ms: 10,
            channel_capacity: 16,
        }
    }

    fn fast_stability() -> StabilityDetector {
        StabilityDetector::new(Duration::from_millis(10), Duration::from_millis(10))
    }

    async fn next_event(rx: &mut mpsc::Receiver<WatchEvent>) -> Option<WatchEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_created_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let inbox = tmp.path().join("Inbox");
        let shutdown = ShutdownSignal::new();
        let watcher = DirectoryWatcher::new(vec![inbox.clone()], &fast_config(), fast_stability());
        let (mut rx, handle) = watcher.spawn(shutdown.clone()).unwrap();
        assert!(inbox.is_dir());

        std::fs::write(inbox.join("note.md"), "hello").unwrap();
        let event = next_event(&mut rx).await.expect("event expected");
        assert_eq!(event.kind, WatchEventKind::Created);
        assert_eq!(event.path, inbox.join("note.md"));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_existing_files_reported_on_first_scan() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("left_over.md"), "x").unwrap();
        let shutdown = ShutdownSignal::new();
        let watcher =
            DirectoryWatcher::new(vec![tmp.path().to_path_buf()], &fast_config(), fast_stability());
        let (mut rx, _handle) = watcher.spawn(shutdown.clone()).unwrap();

        let event = next_event(&mut rx).await.expect("event expected");
        assert_eq!(event.path, tmp.path().join("left_over.md"));
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_filters_restricted_empty_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let shutdown = ShutdownSignal::new();
        let watcher = DirectoryWatcher::new(vec![root.clone()], &fast_config(), fast_stability());
        let (mut rx, _handle) = watcher.spawn(shutdown.clone()).unwrap();

        std::fs::create_dir_all(root.join("Plans")).unwrap();
        std::fs::write(root.join("Plans/PLAN_x.md"), "plan").unwrap();
        std::fs::create_dir_all(root.join("sub/Done")).unwrap();
        std::fs::write(root.join("sub/Done/old.md"), "old").unwrap();
        std::fs::write(root.join("empty.md"), "").unwrap();
        std::fs::create_dir_all(root.join("folder")).unwrap();
        std::fs::write(root.join("folder/real.md"), "real").unwrap();

        let event = next_event(&mut rx).await.expect("event expected");
        assert_eq!(event.path, root.join("folder/real.md"));

        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err(), "unexpected event: {:?}", extra);
        shutdown.trigger();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_move_between_watched_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let shutdown = ShutdownSignal::new();
        let watcher = DirectoryWatcher::new(vec![a.clone(), b.clone()], &fast_config(), fast_stability());
        let (mut rx, _handle) = watcher.spawn(shutdown.clone()).unwrap();

        std::fs::write(a.join("item.md"), "payload").unwrap();
        let created = next_event(&mut rx).await.expect("create event");
        assert_eq!(created.kind, WatchEventKind::Created);

        std::fs::rename(a.join("item.md"), b.join("item.md")).unwrap();
        let moved = next_event(&mut rx).await.expect("move event");
        assert_eq!(moved.kind, WatchEventKind::Moved);
        assert_eq!(moved.path, b.join("item.md"));
        assert_eq!(moved.from, Some(a.join("item.md")));
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_modification_is_not_an_event() {
        let tmp = tempfile::tempdir().unwrap();
        let shutdown = ShutdownSignal::new();
        let watcher =
            DirectoryWatcher::new(vec![tmp.path().to_path_buf()], &fast_config(), fast_stability());
        let (mut rx, _handle) = watcher.spawn(shutdown.clone()).unwrap();

        let path = tmp.path().join("a.md");
        std::fs::write(&path, "v1").unwrap();
        next_event(&mut rx).await.expect("create event");

        std::fs::write(&path, "v2 longer").unwrap();
        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err());
        shutdown.trigger();
    }
}
