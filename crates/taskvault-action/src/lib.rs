//! Action engine for taskvault.
//!
//! Parses approved action files, dispatches them through pluggable handlers
//! over primary/fallback transports, and records every attempt in the audit
//! log. Also hosts the approval gate that sits in front of execution.

pub mod approval;
pub mod audit;
pub mod error;
pub mod executor;
pub mod handler;
pub mod literal;
pub mod normalize;
pub mod parser;
pub mod runner;
pub mod transport;
pub mod types;

pub use approval::{ApprovalGate, ApprovalOutcome, Submission};
pub use audit::{AuditEntry, AuditLog};
pub use error::{ActionError, ApprovalError, ParseError, TransportError};
pub use executor::{ExecutionResult, Executor};
pub use handler::{
    ActionHandler, ActionRegistry, MessageHandler, PlatformHandler, RecordHandler, ToolHandler,
    ToolRegistry,
};
pub use parser::parse;
pub use runner::ApprovedRunner;
pub use transport::{Channel, FallbackTransport};
pub use types::{Action, ActionKind, ActionOutcome, ArgumentMap};
