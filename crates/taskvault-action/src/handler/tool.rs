//! Generic tool-call handler.
//!
//! Resolves the named tool in the [`ToolRegistry`], normalizes argument names
//! and invokes the requested operation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::handler::{ActionHandler, ToolRegistry};
use crate::normalize::normalize_arguments;
use crate::transport::{interpret_response, Channel};
use crate::types::{Action, ActionKind, ActionOutcome, ArgumentMap};

/// Call `operation` on `channel` with normalized arguments.
pub(crate) async fn invoke(
    channel: &Arc<dyn Channel>,
    operation: &str,
    arguments: &ArgumentMap,
) -> Result<ActionOutcome, ActionError> {
    if operation.trim().is_empty() {
        return Err(ActionError::InvalidArguments(
            "operation name must not be empty".to_string(),
        ));
    }
    let arguments = normalize_arguments(arguments);
    let response = interpret_response(channel.name(), channel.call(operation, &arguments).await?)?;
    tracing::info!(tool = %channel.name(), operation = %operation, "Tool call succeeded");
    Ok(ActionOutcome {
        message: format!("{}.{} succeeded", channel.name(), operation),
        output: Some(response),
    })
}

pub struct ToolHandler {
    tools: ToolRegistry,
}

impl ToolHandler {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl ActionHandler for ToolHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ToolCall
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        let Action::ToolCall {
            tool,
            operation,
            arguments,
        } = action
        else {
            return Err(ActionError::InvalidArguments(format!(
                "tool handler cannot run {}",
                action.type_name()
            )));
        };

        let channel = self
            .tools
            .get(tool)
            .ok_or_else(|| ActionError::UnknownTool(tool.clone()))?;
        invoke(&channel, operation, arguments).await
    }

    fn describe(&self, action: &Action) -> String {
        match action {
            Action::ToolCall {
                tool, operation, ..
            } => format!("Call {}.{}", tool, operation),
            other => format!("Call tool ({})", other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::{json, Value};

    struct Records;

    #[async_trait]
    impl Channel for Records {
        fn name(&self) -> &str {
            "records"
        }

        async fn call(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
            Ok(json!({ "op": operation, "args": arguments }))
        }
    }

    fn handler() -> ToolHandler {
        let mut tools = ToolRegistry::new();
        tools.register("records", Arc::new(Records));
        ToolHandler::new(tools)
    }

    #[tokio::test]
    async fn test_call_normalizes_arguments() {
        let mut arguments = ArgumentMap::new();
        arguments.insert("customer".into(), json!("Acme"));
        arguments.insert("price".into(), json!(10));

        let outcome = handler()
            .execute(&Action::ToolCall {
                tool: "records".into(),
                operation: "create_invoice".into(),
                arguments,
            })
            .await
            .unwrap();

        assert_eq!(outcome.message, "records.create_invoice succeeded");
        let output = outcome.output.unwrap();
        assert_eq!(output["args"]["client_name"], json!("Acme"));
        assert_eq!(output["args"]["amount"], json!(10));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = handler()
            .execute(&Action::ToolCall {
                tool: "Fax".into(),
                operation: "send".into(),
                arguments: ArgumentMap::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownTool(name) if name == "Fax"));
    }

    struct Declining;

    #[async_trait]
    impl Channel for Declining {
        fn name(&self) -> &str {
            "calendar"
        }

        async fn call(&self, _operation: &str, _arguments: &ArgumentMap) -> Result<Value, TransportError> {
            Ok(json!({ "success": false, "error": "slot taken" }))
        }
    }

    #[tokio::test]
    async fn test_refused_call_is_an_error() {
        let mut tools = ToolRegistry::new();
        tools.register("calendar", Arc::new(Declining));
        let err = ToolHandler::new(tools)
            .execute(&Action::ToolCall {
                tool: "calendar".into(),
                operation: "book".into(),
                arguments: ArgumentMap::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Rejected(reason) if reason.contains("slot taken")));
    }
}
