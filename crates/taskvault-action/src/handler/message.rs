//! Message-send handler.
//!
//! Delivers an outbound message through the mail channel after reducing the
//! recipient to a bare address.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ActionError;
use crate::handler::ActionHandler;
use crate::transport::{interpret_response, Channel};
use crate::types::{normalize_recipient, Action, ActionKind, ActionOutcome, ArgumentMap};

pub const SEND_OPERATION: &str = "send_email";

pub struct MessageHandler {
    channel: Arc<dyn Channel>,
}

impl MessageHandler {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ActionHandler for MessageHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::MessageSend
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        let Action::MessageSend { to, subject, body } = action else {
            return Err(ActionError::InvalidArguments(format!(
                "message handler cannot run {}",
                action.type_name()
            )));
        };

        let recipient = normalize_recipient(to);
        if !recipient.contains('@') {
            return Err(ActionError::InvalidArguments(format!(
                "recipient is not an address: {}",
                to
            )));
        }

        let mut arguments = ArgumentMap::new();
        arguments.insert("to".into(), json!(recipient));
        arguments.insert("subject".into(), json!(subject));
        arguments.insert("body".into(), json!(body));

        let response = self.channel.call(SEND_OPERATION, &arguments).await?;
        let response = interpret_response(self.channel.name(), response)?;
        tracing::info!(to = %recipient, subject = %subject, channel = %self.channel.name(), "Message sent");

        Ok(ActionOutcome {
            message: format!("Message sent to {}: {}", recipient, subject),
            output: Some(response),
        })
    }

    fn describe(&self, action: &Action) -> String {
        match action {
            Action::MessageSend { to, subject, .. } => {
                format!("Send message to {}: {}", normalize_recipient(to), subject)
            }
            other => format!("Send message ({})", other.type_name()),
        }
    }
}
