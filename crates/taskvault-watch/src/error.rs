use taskvault_core::error::VaultError;
use thiserror::Error;

/// Errors from the watch, intake and producer side of the pipeline.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not in a watched stage: {0}")]
    OutsideStage(String),

    #[error("Producer error: {0}")]
    Producer(String),
}

impl WatchError {
    /// Whether the item should simply be retried on the next pass.
    pub fn is_transient(&self) -> bool {
        match self {
            WatchError::Vault(e) => e.is_transient(),
            WatchError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }
}
