//! Core types for the action engine.
//!
//! An [`Action`] is a closed set of variants. Anything the parser does not
//! recognise becomes [`Action::Unknown`] and is rejected at dispatch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named arguments passed to an external operation.
pub type ArgumentMap = serde_json::Map<String, Value>;

// =============================================================================
// ActionKind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MessageSend,
    PlatformPost,
    RecordCreate,
    ToolCall,
    Unknown,
}

impl ActionKind {
    /// Resolve a `type:` value, including the legacy aliases.
    pub fn from_type_name(name: &str) -> ActionKind {
        match name.trim().to_ascii_lowercase().as_str() {
            "message_send" | "email_send" => ActionKind::MessageSend,
            "platform_post" | "social_post" | "linkedin_post" => ActionKind::PlatformPost,
            "record_create" | "invoice_create" => ActionKind::RecordCreate,
            "tool_call" | "approval_request" => ActionKind::ToolCall,
            _ => ActionKind::Unknown,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::MessageSend => write!(f, "message_send"),
            ActionKind::PlatformPost => write!(f, "platform_post"),
            ActionKind::RecordCreate => write!(f, "record_create"),
            ActionKind::ToolCall => write!(f, "tool_call"),
            ActionKind::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MessageSend {
        to: String,
        subject: String,
        body: String,
    },
    PlatformPost {
        platform: String,
        content: String,
    },
    RecordCreate {
        operation: String,
        arguments: ArgumentMap,
    },
    ToolCall {
        tool: String,
        operation: String,
        arguments: ArgumentMap,
    },
    Unknown {
        type_name: String,
        fields: BTreeMap<String, String>,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MessageSend { .. } => ActionKind::MessageSend,
            Action::PlatformPost { .. } => ActionKind::PlatformPost,
            Action::RecordCreate { .. } => ActionKind::RecordCreate,
            Action::ToolCall { .. } => ActionKind::ToolCall,
            Action::Unknown { .. } => ActionKind::Unknown,
        }
    }

    /// The `type:` value this action was written with, canonicalised.
    pub fn type_name(&self) -> String {
        match self {
            Action::Unknown { type_name, .. } => type_name.clone(),
            other => other.kind().to_string(),
        }
    }

    /// Serialise to the structured action-file encoding.
    pub fn render(&self) -> String {
        let mut doc = serde_yaml::Mapping::new();
        let mut put = |key: &str, value: serde_yaml::Value| {
            doc.insert(serde_yaml::Value::String(key.to_string()), value);
        };
        let text = |s: &str| serde_yaml::Value::String(s.to_string());

        put("type", text(&self.type_name()));
        match self {
            Action::MessageSend { to, subject, body } => {
                put("to", text(to));
                put("subject", text(subject));
                put("body", text(body));
            }
            Action::PlatformPost { platform, content } => {
                put("platform", text(platform));
                put("content", text(content));
            }
            Action::RecordCreate {
                operation,
                arguments,
            } => {
                put("action", text(operation));
                put("arguments", arguments_to_yaml(arguments));
            }
            Action::ToolCall {
                tool,
                operation,
                arguments,
            } => {
                put("tool", text(tool));
                put("action", text(operation));
                put("arguments", arguments_to_yaml(arguments));
            }
            Action::Unknown { fields, .. } => {
                for (key, value) in fields {
                    if key != "type" {
                        put(key, text(value));
                    }
                }
            }
        }
        // Mapping of strings and JSON-compatible values always serialises.
        serde_yaml::to_string(&doc).unwrap_or_default()
    }
}

fn arguments_to_yaml(arguments: &ArgumentMap) -> serde_yaml::Value {
    serde_yaml::to_value(arguments).unwrap_or(serde_yaml::Value::Null)
}

/// Reduce `Name <addr@host>` to `addr@host`; other forms pass through trimmed.
pub fn normalize_recipient(raw: &str) -> String {
    let raw = raw.trim();
    match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => raw[start + 1..end].trim().to_string(),
        _ => raw.to_string(),
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What a handler reports after a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub message: String,
    pub output: Option<Value>,
}
