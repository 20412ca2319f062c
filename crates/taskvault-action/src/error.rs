//! Error types for the action engine.

use taskvault_core::error::VaultError;

/// Errors from parsing an action file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Action file is empty")]
    Empty,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Malformed literal at offset {offset}: {reason}")]
    Literal { offset: usize, reason: String },
}

/// Errors from a single transport channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Channel {channel} timed out after {after_ms} ms")]
    Timeout { channel: String, after_ms: u64 },
    #[error("Channel {channel} unavailable: {reason}")]
    Unavailable { channel: String, reason: String },
    #[error("Channel {channel} rejected the call: {reason}")]
    Rejected { channel: String, reason: String },
}

/// Errors from action dispatch and execution.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action type: {0}")]
    UnknownActionType(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Action rejected: {0}")]
    Rejected(String),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),
}

impl From<TransportError> for ActionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { .. } => ActionError::Rejected(err.to_string()),
            _ => ActionError::Connection(err.to_string()),
        }
    }
}

/// Errors from the approval gate.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
