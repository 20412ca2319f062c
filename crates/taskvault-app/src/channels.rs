//! Dry-run collaborator channels.
//!
//! Each external system is stood in for by a channel that logs the call and
//! answers with a success document, so the pipeline runs end to end without
//! credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use taskvault_action::{
    ActionRegistry, ArgumentMap, Channel, FallbackTransport, MessageHandler, PlatformHandler,
    RecordHandler, ToolHandler, ToolRegistry, TransportError,
};

pub struct LoggingChannel {
    name: String,
}

impl LoggingChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Channel for LoggingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
        let keys: Vec<&str> = arguments.keys().map(String::as_str).collect();
        tracing::info!(channel = %self.name, operation = %operation, arguments = ?keys, "Dry-run call");
        Ok(json!({
            "success": true,
            "dry_run": true,
            "channel": self.name,
            "operation": operation,
        }))
    }
}

/// A primary/fallback pair of dry-run channels for one collaborator.
fn dry_run_pair(name: &str, primary_timeout: Duration) -> Arc<FallbackTransport> {
    Arc::new(FallbackTransport::new(
        name,
        Arc::new(LoggingChannel::new(format!("{}-rpc", name))),
        Arc::new(LoggingChannel::new(format!("{}-direct", name))),
        primary_timeout,
    ))
}

/// Registry with every action kind wired to dry-run collaborators.
pub fn dry_run_registry(record_tool: &str, primary_timeout: Duration) -> ActionRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(record_tool, dry_run_pair(record_tool, primary_timeout));

    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(MessageHandler::new(dry_run_pair("mail", primary_timeout))));
    registry.register(Arc::new(PlatformHandler::new(Arc::new(LoggingChannel::new(
        "social",
    )))));
    registry.register(Arc::new(RecordHandler::new(tools.clone(), record_tool)));
    registry.register(Arc::new(ToolHandler::new(tools)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskvault_action::ActionKind;

    #[tokio::test]
    async fn test_logging_channel_reports_success() {
        let channel = LoggingChannel::new("mail-rpc");
        let out = channel.call("send_email", &ArgumentMap::new()).await.unwrap();
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["channel"], json!("mail-rpc"));
    }

    #[test]
    fn test_registry_covers_every_kind() {
        let registry = dry_run_registry("records", Duration::from_secs(5));
        assert_eq!(
            registry.kinds(),
            vec![
                ActionKind::MessageSend,
                ActionKind::PlatformPost,
                ActionKind::RecordCreate,
                ActionKind::ToolCall,
            ]
        );
    }
}
