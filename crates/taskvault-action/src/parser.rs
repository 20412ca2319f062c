//! Action-file parser.
//!
//! Two tiers, tried in order:
//!
//! 1. Structured: the whole file is a key/value document (YAML). Used when it
//!    parses as a mapping with a `type` key and yields a well-formed action.
//! 2. Line-oriented: either a header block terminated by a blank line with
//!    free text after it, or a top-to-bottom scan of `key: value` lines where
//!    `body:` absorbs every following line up to the next known field.
//!
//! Tool-call and record-create actions additionally read a
//! `Tool Arguments:` block holding a literal mapping, which runs through the
//! safe evaluator in [`crate::literal`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ParseError;
use crate::literal::parse_mapping;
use crate::types::{Action, ActionKind, ArgumentMap};

/// Field names that end body capture in line-oriented files.
pub const KNOWN_FIELDS: &[&str] = &[
    "type", "to", "target", "subject", "body", "from", "cc", "bcc", "tool", "action", "content",
    "platform",
];

static TOOL_ARGUMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Tool Arguments:[ \t]*\r?\n(.*?)(?:\n---|\z)").unwrap());

static FIELD_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_ ]*$").unwrap());

/// Raw fields pulled out of a file before they are typed.
#[derive(Debug, Default)]
struct Fields {
    values: BTreeMap<String, String>,
    arguments: Option<ArgumentMap>,
}

impl Fields {
    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Parse the text of an action file.
pub fn parse(content: &str) -> Result<Action, ParseError> {
    if content.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(fields) = structured(content) {
        match build(fields, content) {
            Ok(action) => return Ok(action),
            Err(e) => debug!(error = %e, "Structured parse incomplete, trying line grammar"),
        }
    }

    build(line_oriented(content), content)
}

// =============================================================================
// Tier 1
// =============================================================================

fn structured(content: &str) -> Option<Fields> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content).ok()?;
    let mapping = doc.as_mapping()?;

    let mut fields = Fields::default();
    for (key, value) in mapping {
        let Some(key) = key.as_str().map(|k| k.trim().to_ascii_lowercase()) else {
            continue;
        };
        match value {
            serde_yaml::Value::String(s) => {
                fields.values.insert(key, s.clone());
            }
            serde_yaml::Value::Number(n) => {
                fields.values.insert(key, n.to_string());
            }
            serde_yaml::Value::Bool(b) => {
                fields.values.insert(key, b.to_string());
            }
            serde_yaml::Value::Mapping(_) if key == "arguments" || key == "tool arguments" => {
                if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(value) {
                    fields.arguments = Some(map);
                }
            }
            _ => {}
        }
    }

    fields.values.contains_key("type").then_some(fields)
}

// =============================================================================
// Tier 2
// =============================================================================

fn field_of(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.trim().split_once(':')?;
    let key = key.trim().to_ascii_lowercase();
    FIELD_KEY.is_match(&key).then(|| (key, value.trim()))
}

fn starts_with_known_field(line: &str) -> bool {
    let lower = line.trim_start().to_ascii_lowercase();
    KNOWN_FIELDS.iter().any(|field| {
        lower
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

fn line_oriented(content: &str) -> Fields {
    let lines: Vec<&str> = content.trim().lines().collect();
    let first_blank = lines.iter().position(|l| l.trim().is_empty());
    let first_body = lines
        .iter()
        .position(|l| field_of(l).is_some_and(|(k, _)| k == "body"));

    let header_end = match (first_blank, first_body) {
        (Some(_), Some(body)) if first_blank > Some(body) => None,
        (blank, _) => blank,
    };

    let mut fields = Fields::default();
    match header_end {
        Some(end) => {
            for line in &lines[..end] {
                if let Some((key, value)) = field_of(line) {
                    fields.values.insert(key, value.to_string());
                }
            }
            let body = lines[end + 1..].join("\n");
            let body = body.trim();
            if !body.is_empty() {
                fields.values.insert("body".into(), body.to_string());
            }
        }
        None => scan_lines(&lines, &mut fields),
    }
    fields
}

fn scan_lines(lines: &[&str], fields: &mut Fields) {
    let mut i = 0;
    while i < lines.len() {
        let Some((key, value)) = field_of(lines[i]) else {
            i += 1;
            continue;
        };

        if key == "body" {
            let mut parts = vec![value.to_string()];
            i += 1;
            while i < lines.len() && !starts_with_known_field(lines[i]) {
                parts.push(lines[i].trim_end().to_string());
                i += 1;
            }
            fields
                .values
                .insert(key, parts.join("\n").trim().to_string());
            continue;
        }

        fields.values.insert(key, value.to_string());
        i += 1;
    }
}

// =============================================================================
// Typing
// =============================================================================

/// Extract and evaluate the `Tool Arguments:` block, if present.
pub fn tool_arguments(content: &str) -> Result<Option<ArgumentMap>, ParseError> {
    match TOOL_ARGUMENTS.captures(content) {
        Some(caps) => parse_mapping(caps[1].trim()).map(Some),
        None => Ok(None),
    }
}

fn build(fields: Fields, content: &str) -> Result<Action, ParseError> {
    let type_name = fields
        .get("type")
        .map(|t| t.to_ascii_lowercase())
        .ok_or(ParseError::MissingField("type"))?;

    let required = |key: &'static str| -> Result<String, ParseError> {
        fields
            .get(key)
            .map(str::to_string)
            .ok_or(ParseError::MissingField(key))
    };

    match ActionKind::from_type_name(&type_name) {
        ActionKind::MessageSend => Ok(Action::MessageSend {
            to: fields
                .get("to")
                .or_else(|| fields.get("target"))
                .map(str::to_string)
                .ok_or(ParseError::MissingField("to"))?,
            subject: required("subject")?,
            body: required("body")?,
        }),
        ActionKind::PlatformPost => {
            let implied = (type_name == "linkedin_post").then_some("linkedin");
            let platform = fields
                .get("platform")
                .or_else(|| fields.get("target"))
                .or(implied)
                .map(str::to_string)
                .ok_or(ParseError::MissingField("platform"))?;
            let content = fields
                .get("content")
                .or_else(|| fields.get("body"))
                .map(str::to_string)
                .ok_or(ParseError::MissingField("content"))?;
            Ok(Action::PlatformPost { platform, content })
        }
        ActionKind::RecordCreate => {
            let implied = (type_name == "invoice_create").then_some("create_invoice");
            let operation = fields
                .get("action")
                .or(implied)
                .map(str::to_string)
                .ok_or(ParseError::MissingField("action"))?;
            let arguments = arguments_of(fields.arguments.clone(), content)?;
            Ok(Action::RecordCreate {
                operation,
                arguments,
            })
        }
        ActionKind::ToolCall => {
            let tool = required("tool")?;
            let operation = required("action")?;
            let arguments = arguments_of(fields.arguments.clone(), content)?;
            Ok(Action::ToolCall {
                tool,
                operation,
                arguments,
            })
        }
        ActionKind::Unknown => {
            let mut values = fields.values;
            values.remove("type");
            Ok(Action::Unknown {
                type_name,
                fields: values,
            })
        }
    }
}

fn arguments_of(structured: Option<ArgumentMap>, content: &str) -> Result<ArgumentMap, ParseError> {
    if let Some(arguments) = structured {
        return Ok(arguments);
    }
    match tool_arguments(content)? {
        Some(arguments) => Ok(arguments),
        None => {
            debug!("No Tool Arguments block, calling with no arguments");
            Ok(ArgumentMap::new())
        }
    }
}
