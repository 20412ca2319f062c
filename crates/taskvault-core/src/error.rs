use thiserror::Error;

use crate::layout::Stage;

/// Top-level error type for the taskvault system.
///
/// Subsystem crates define their own error types and implement
/// `From<VaultError>` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Item not found in {stage}: {name}")]
    NotFound { stage: Stage, name: String },

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Invalid item name: {0}")]
    InvalidName(String),
}

impl VaultError {
    /// Whether the failure is expected to clear up by itself on a later pass.
    ///
    /// Transient failures leave the item where it is; the next cycle retries.
    pub fn is_transient(&self) -> bool {
        match self {
            VaultError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            ),
            VaultError::NotFound { .. } => true,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for VaultError {
    fn from(err: toml::de::Error) -> Self {
        VaultError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VaultError {
    fn from(err: toml::ser::Error) -> Self {
        VaultError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
