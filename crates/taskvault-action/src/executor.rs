//! Action executor: dispatch, audit, no automatic retry.
//!
//! A failed action is never retried here. It is recorded in the audit log and
//! left for the operator to resubmit.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::AuditLog;
use crate::error::ActionError;
use crate::handler::ActionRegistry;
use crate::parser::parse;
use crate::types::{Action, ActionKind, ActionOutcome};

/// Action type recorded for files that never parsed into an action.
pub const UNPARSED_ACTION_TYPE: &str = "unparsed";

#[derive(Debug)]
pub struct ExecutionResult {
    pub action_type: String,
    pub outcome: Result<ActionOutcome, ActionError>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn summary(&self) -> String {
        match &self.outcome {
            Ok(outcome) => outcome.message.clone(),
            Err(e) => e.to_string(),
        }
    }
}

pub struct Executor {
    registry: ActionRegistry,
    audit: Arc<AuditLog>,
}

impl Executor {
    pub fn new(registry: ActionRegistry, audit: Arc<AuditLog>) -> Self {
        Self { registry, audit }
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub async fn execute(&self, action: &Action) -> ExecutionResult {
        let action_type = action.type_name();

        let outcome = if action.kind() == ActionKind::Unknown {
            Err(ActionError::UnknownActionType(action_type.clone()))
        } else {
            match self.registry.resolve(action) {
                Ok(handler) => {
                    debug!(action = %handler.describe(action), "Executing action");
                    handler.execute(action).await
                }
                Err(e) => Err(e),
            }
        };

        let result = ExecutionResult {
            action_type,
            outcome,
        };
        self.finish(result)
    }

    /// Parse `content` and execute it. A parse failure is audited under
    /// [`UNPARSED_ACTION_TYPE`].
    pub async fn execute_content(&self, content: &str) -> ExecutionResult {
        match parse(content) {
            Ok(action) => self.execute(&action).await,
            Err(e) => self.finish(ExecutionResult {
                action_type: UNPARSED_ACTION_TYPE.to_string(),
                outcome: Err(ActionError::Parse(e)),
            }),
        }
    }

    /// Audit a file that could not be read as text at all.
    pub fn reject_unreadable(&self, error: ActionError) -> ExecutionResult {
        self.finish(ExecutionResult {
            action_type: UNPARSED_ACTION_TYPE.to_string(),
            outcome: Err(error),
        })
    }

    fn finish(&self, result: ExecutionResult) -> ExecutionResult {
        let summary = result.summary();
        if let Err(e) = &result.outcome {
            warn!(action_type = %result.action_type, error = %e, "Action failed");
        }
        self.audit
            .record(&result.action_type, result.is_success(), &summary);
        result
    }
}
