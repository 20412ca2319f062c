use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{validate_plan_transition, validate_task_transition, StatusError};

// =============================================================================
// Enums
// =============================================================================

/// Task urgency as extracted from the source item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" | "normal" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Lifecycle of a task.
///
/// `New -> Planned -> Approved -> InProgress -> Completed | Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Planned,
    Approved,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::New => "new",
            TaskStatus::Planned => "planned",
            TaskStatus::Approved => "approved",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a plan.
///
/// `Draft -> Review -> Approved -> Executing -> Completed`, and any
/// non-terminal state may be cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Review,
    Approved,
    Executing,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Review => "review",
            PlanStatus::Approved => "approved",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Advisory status of an approval request.
///
/// Only the status-field protocol reads this; for the directory protocol the
/// artifact's location is authoritative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "expired" => Ok(ApprovalStatus::Expired),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

// =============================================================================
// Timestamp
// =============================================================================

/// Unix timestamp in seconds (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

// =============================================================================
// Domain entities
// =============================================================================

/// A logical unit of work derived from one source item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Path of the item the task was derived from.
    pub source: PathBuf,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: Timestamp,
}

impl Task {
    pub fn new(
        source: impl Into<PathBuf>,
        title: impl Into<String>,
        content: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            title: title.into(),
            content: content.into(),
            priority,
            status: TaskStatus::New,
            created_at: Timestamp::now(),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), StatusError> {
        validate_task_transition(self.status, next)?;
        self.status = next;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub completed: bool,
}

impl PlanStep {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed: false,
        }
    }
}

/// A checklist tied to exactly one task.
///
/// Immutable once written except for step completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    steps: Vec<PlanStep>,
    pub status: PlanStatus,
    pub estimated_minutes: Option<u32>,
    pub created_at: Timestamp,
}

impl Plan {
    pub fn new(task: &Task, steps: Vec<PlanStep>, estimated_minutes: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task.id,
            title: task.title.clone(),
            steps,
            status: PlanStatus::Draft,
            estimated_minutes,
            created_at: Timestamp::now(),
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Mark step `index` done. Returns false if the index is out of range.
    pub fn complete_step(&mut self, index: usize) -> bool {
        match self.steps.get_mut(index) {
            Some(step) => {
                step.completed = true;
                true
            }
            None => false,
        }
    }

    pub fn progress(&self) -> (usize, usize) {
        let done = self.steps.iter().filter(|s| s.completed).count();
        (done, self.steps.len())
    }

    pub fn advance(&mut self, next: PlanStatus) -> Result<(), StatusError> {
        validate_plan_transition(self.status, next)?;
        self.status = next;
        Ok(())
    }
}

/// One pending human decision, backed by a file in `Pending_Approval`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub action_type: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub status: ApprovalStatus,
    pub created_at: Timestamp,
}

impl ApprovalRequest {
    pub fn new(
        action_type: impl Into<String>,
        parameters: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type: action_type.into(),
            parameters,
            status: ApprovalStatus::Pending,
            created_at: Timestamp::now(),
        }
    }

    /// File name used in `Pending_Approval`: `<action_type>_<id>.json`.
    pub fn file_name(&self) -> String {
        crate::fsops::sanitize_filename(&format!("{}_{}.json", self.action_type, self.id.simple()))
    }
}
