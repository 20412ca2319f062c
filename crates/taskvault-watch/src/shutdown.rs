//! Cooperative shutdown shared by every long-running loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A "running" flag plus a wake-up for loops parked in a sleep.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    running: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                running: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag and wake every parked loop.
    pub fn trigger(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Sleep for `duration` unless shutdown arrives first.
    ///
    /// Returns `true` if the full sleep elapsed and the loop should go on.
    pub async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.is_running() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = &mut notified => false,
        }
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
