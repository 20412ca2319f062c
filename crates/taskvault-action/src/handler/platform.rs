//! Platform-post handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ActionError;
use crate::handler::ActionHandler;
use crate::transport::{interpret_response, Channel};
use crate::types::{Action, ActionKind, ActionOutcome, ArgumentMap};

pub const POST_OPERATION: &str = "create_post";

/// Publishes content to a named platform through the social channel.
pub struct PlatformHandler {
    channel: Arc<dyn Channel>,
}

impl PlatformHandler {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ActionHandler for PlatformHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::PlatformPost
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        let Action::PlatformPost { platform, content } = action else {
            return Err(ActionError::InvalidArguments(format!(
                "platform handler cannot run {}",
                action.type_name()
            )));
        };

        if content.trim().is_empty() {
            return Err(ActionError::InvalidArguments(
                "Post content must not be empty".to_string(),
            ));
        }

        let mut arguments = ArgumentMap::new();
        arguments.insert("platform".into(), json!(platform.to_ascii_lowercase()));
        arguments.insert("content".into(), json!(content));

        let response = self.channel.call(POST_OPERATION, &arguments).await?;
        let response = interpret_response(self.channel.name(), response)?;
        tracing::info!(platform = %platform, chars = content.chars().count(), "Post published");

        Ok(ActionOutcome {
            message: format!("Posted to {}", platform),
            output: Some(response),
        })
    }

    fn describe(&self, action: &Action) -> String {
        match action {
            Action::PlatformPost { platform, content } => {
                let preview: String = content.chars().take(40).collect();
                format!("Post to {}: {}", platform, preview)
            }
            other => format!("Post ({})", other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::Value;

    struct Social;

    struct ExpiredSession;

    #[async_trait]
    impl Channel for ExpiredSession {
        fn name(&self) -> &str {
            "social"
        }

        async fn call(&self, _operation: &str, _arguments: &ArgumentMap) -> Result<Value, TransportError> {
            Ok(json!({ "success": false, "error": "login expired" }))
        }
    }

    #[async_trait]
    impl Channel for Social {
        fn name(&self) -> &str {
            "social"
        }

        async fn call(&self, _operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
            Ok(json!({ "platform": arguments["platform"] }))
        }
    }

    #[tokio::test]
    async fn test_post_lowercases_platform() {
        let handler = PlatformHandler::new(Arc::new(Social));
        let outcome = handler
            .execute(&Action::PlatformPost {
                platform: "LinkedIn".into(),
                content: "Launch day".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.message, "Posted to LinkedIn");
        assert_eq!(outcome.output, Some(json!({ "platform": "linkedin" })));
    }

    #[tokio::test]
    async fn test_refused_post_is_an_error() {
        let handler = PlatformHandler::new(Arc::new(ExpiredSession));
        let err = handler
            .execute(&Action::PlatformPost {
                platform: "linkedin".into(),
                content: "Launch day".into(),
            })
            .await
            .unwrap_err();
        match err {
            ActionError::Rejected(reason) => assert!(reason.contains("login expired")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let handler = PlatformHandler::new(Arc::new(Social));
        let err = handler
            .execute(&Action::PlatformPost {
                platform: "linkedin".into(),
                content: "  ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments(_)));
    }
}
