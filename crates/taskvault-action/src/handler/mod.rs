//! Action handler registry and trait definition.
//!
//! Defines the `ActionHandler` async trait, the registry that dispatches a
//! parsed [`Action`] to the handler for its kind, and the tool registry that
//! resolves tool names to transport channels.

pub mod message;
pub mod platform;
pub mod record;
pub mod tool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::transport::Channel;
use crate::types::{Action, ActionKind, ActionOutcome};

pub use message::MessageHandler;
pub use platform::PlatformHandler;
pub use record::RecordHandler;
pub use tool::ToolHandler;

#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler serves.
    fn kind(&self) -> ActionKind;

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError>;

    /// One-line human description of what `execute` would do.
    fn describe(&self, action: &Action) -> String;
}

/// Handlers keyed by action kind. `Unknown` is never registered.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        let kind = handler.kind();
        if kind == ActionKind::Unknown {
            tracing::warn!("Refusing to register a handler for unknown actions");
            return;
        }
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Look up the handler for `action`, rejecting unknown kinds.
    pub fn resolve(&self, action: &Action) -> Result<Arc<dyn ActionHandler>, ActionError> {
        self.get(action.kind())
            .ok_or_else(|| ActionError::UnknownActionType(action.type_name()))
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }
}

/// External systems addressable by name from tool-call actions.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Channel>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, channel: Arc<dyn Channel>) {
        self.tools.insert(name.into(), channel);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.tools.get(name).cloned()
    }
}
