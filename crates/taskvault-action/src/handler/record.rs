//! Record-create handler: a tool call against the configured records tool.

use async_trait::async_trait;

use crate::error::ActionError;
use crate::handler::tool::invoke;
use crate::handler::{ActionHandler, ToolRegistry};
use crate::types::{Action, ActionKind, ActionOutcome};

pub struct RecordHandler {
    tools: ToolRegistry,
    record_tool: String,
}

impl RecordHandler {
    pub fn new(tools: ToolRegistry, record_tool: impl Into<String>) -> Self {
        Self {
            tools,
            record_tool: record_tool.into(),
        }
    }
}

#[async_trait]
impl ActionHandler for RecordHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RecordCreate
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        let Action::RecordCreate {
            operation,
            arguments,
        } = action
        else {
            return Err(ActionError::InvalidArguments(format!(
                "record handler cannot run {}",
                action.type_name()
            )));
        };

        let channel = self
            .tools
            .get(&self.record_tool)
            .ok_or_else(|| ActionError::UnknownTool(self.record_tool.clone()))?;
        invoke(&channel, operation, arguments).await
    }

    fn describe(&self, action: &Action) -> String {
        match action {
            Action::RecordCreate { operation, .. } => {
                format!("Create record via {}.{}", self.record_tool, operation)
            }
            other => format!("Create record ({})", other.type_name()),
        }
    }
}
