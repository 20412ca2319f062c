//! Write-completion detection by size polling.

use std::path::Path;
use std::time::Duration;

use taskvault_core::config::StabilityConfig;
use tracing::debug;

/// Wait until the file at `path` stops growing.
///
/// Polls the size every `poll_interval`. Once two consecutive reads agree,
/// waits a further `confirm_delay` and reads again; only a third identical
/// size counts as stable. Returns `false` if the file disappears.
pub async fn await_stable(path: &Path, poll_interval: Duration, confirm_delay: Duration) -> bool {
    let Some(mut last) = file_size(path).await else {
        return false;
    };

    loop {
        tokio::time::sleep(poll_interval).await;
        let Some(current) = file_size(path).await else {
            return false;
        };
        if current != last {
            debug!(path = %path.display(), size = current, "File still growing");
            last = current;
            continue;
        }

        tokio::time::sleep(confirm_delay).await;
        let Some(confirmed) = file_size(path).await else {
            return false;
        };
        if confirmed == current {
            return true;
        }
        last = confirmed;
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    }
}

/// [`await_stable`] with timings taken from configuration.
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    poll_interval: Duration,
    confirm_delay: Duration,
}

impl StabilityDetector {
    pub fn new(poll_interval: Duration, confirm_delay: Duration) -> Self {
        Self {
            poll_interval,
            confirm_delay,
        }
    }

    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.poll_interval(), config.confirm_delay())
    }

    pub async fn await_stable(&self, path: &Path) -> bool {
        await_stable(path, self.poll_interval, self.confirm_delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    #[tokio::test]
    async fn test_static_file_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "done").unwrap();

        let start = Instant::now();
        let stable = await_stable(&path, Duration::from_millis(10), Duration::from_millis(30)).await;
        assert!(stable);
        // Both the poll and the confirmation window were observed.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let stable = await_stable(
            &tmp.path().join("nope.md"),
            Duration::from_millis(5),
            Duration::from_millis(5),
        )
        .await;
        assert!(!stable);
    }

    #[tokio::test]
    async fn test_deleted_during_wait_is_not_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "x").unwrap();

        let remove = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            std::fs::remove_file(remove).unwrap();
        });

        let stable = await_stable(&path, Duration::from_millis(50), Duration::from_millis(50)).await;
        assert!(!stable);
    }

    #[tokio::test]
    async fn test_growing_file_waits_for_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.bin");
        std::fs::write(&path, "").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..20 {
                let mut f = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                f.write_all(&[b'x'; 10]).unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let detector = StabilityDetector::new(Duration::from_millis(50), Duration::from_millis(50));
        assert!(detector.await_stable(&path).await);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 200);
        writer.await.unwrap();
    }
}
