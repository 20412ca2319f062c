//! Validated transitions for stages, tasks and plans.
//!
//! Stage moves:
//! Inbox -> Needs_Action -> Done
//! Pending_Approval -> Approved -> Done
//! Plans -> Done

use thiserror::Error;

use crate::error::VaultError;
use crate::layout::Stage;
use crate::types::{PlanStatus, TaskStatus};

/// Rejected status change on a task or plan.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {kind} status transition: {from} -> {to}")]
pub struct StatusError {
    pub kind: &'static str,
    pub from: String,
    pub to: String,
}

/// Validate that an artifact may move between two stage directories.
pub fn validate_stage_transition(from: Stage, to: Stage) -> Result<(), VaultError> {
    let valid = matches!(
        (from, to),
        (Stage::Inbox, Stage::NeedsAction)
            | (Stage::NeedsAction, Stage::Done)
            | (Stage::PendingApproval, Stage::Approved)
            | (Stage::PendingApproval, Stage::Done)
            | (Stage::Approved, Stage::Done)
            | (Stage::Plans, Stage::Done)
    );

    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidTransition { from, to })
    }
}

pub fn validate_task_transition(from: TaskStatus, to: TaskStatus) -> Result<(), StatusError> {
    let valid = matches!(
        (from, to),
        (TaskStatus::New, TaskStatus::Planned)
            | (TaskStatus::Planned, TaskStatus::Approved)
            | (TaskStatus::Approved, TaskStatus::InProgress)
            | (TaskStatus::InProgress, TaskStatus::Completed)
            | (TaskStatus::InProgress, TaskStatus::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(StatusError {
            kind: "task",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

pub fn validate_plan_transition(from: PlanStatus, to: PlanStatus) -> Result<(), StatusError> {
    let valid = matches!(
        (from, to),
        (PlanStatus::Draft, PlanStatus::Review)
            | (PlanStatus::Review, PlanStatus::Approved)
            | (PlanStatus::Approved, PlanStatus::Executing)
            | (PlanStatus::Executing, PlanStatus::Completed)
    ) || (to == PlanStatus::Cancelled && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(StatusError {
            kind: "plan",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Stages
    // =====================================================================

    #[test]
    fn test_intake_transition() {
        assert!(validate_stage_transition(Stage::Inbox, Stage::NeedsAction).is_ok());
    }

    #[test]
    fn test_approval_transitions() {
        assert!(validate_stage_transition(Stage::PendingApproval, Stage::Approved).is_ok());
        assert!(validate_stage_transition(Stage::Approved, Stage::Done).is_ok());
    }

    #[test]
    fn test_done_is_terminal() {
        for stage in Stage::ALL {
            assert!(validate_stage_transition(Stage::Done, stage).is_err());
        }
    }

    #[test]
    fn test_cannot_bypass_approval() {
        let err = validate_stage_transition(Stage::NeedsAction, Stage::Approved).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid stage transition: Needs_Action -> Approved"
        );
    }

    // =====================================================================
    // Tasks
    // =====================================================================

    #[test]
    fn test_task_linear_path() {
        assert!(validate_task_transition(TaskStatus::New, TaskStatus::Planned).is_ok());
        assert!(validate_task_transition(TaskStatus::Planned, TaskStatus::Approved).is_ok());
        assert!(validate_task_transition(TaskStatus::Approved, TaskStatus::InProgress).is_ok());
        assert!(validate_task_transition(TaskStatus::InProgress, TaskStatus::Completed).is_ok());
        assert!(validate_task_transition(TaskStatus::InProgress, TaskStatus::Failed).is_ok());
    }

    #[test]
    fn test_task_terminal_states_are_final() {
        assert!(validate_task_transition(TaskStatus::Completed, TaskStatus::InProgress).is_err());
        assert!(validate_task_transition(TaskStatus::Failed, TaskStatus::New).is_err());
    }

    #[test]
    fn test_task_error_message() {
        let err = validate_task_transition(TaskStatus::New, TaskStatus::Completed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid task status transition: new -> completed"
        );
    }

    // =====================================================================
    // Plans
    // =====================================================================

    #[test]
    fn test_plan_linear_path() {
        assert!(validate_plan_transition(PlanStatus::Draft, PlanStatus::Review).is_ok());
        assert!(validate_plan_transition(PlanStatus::Review, PlanStatus::Approved).is_ok());
        assert!(validate_plan_transition(PlanStatus::Approved, PlanStatus::Executing).is_ok());
        assert!(validate_plan_transition(PlanStatus::Executing, PlanStatus::Completed).is_ok());
    }

    #[test]
    fn test_plan_cancel_from_any_open_state() {
        for from in [
            PlanStatus::Draft,
            PlanStatus::Review,
            PlanStatus::Approved,
            PlanStatus::Executing,
        ] {
            assert!(validate_plan_transition(from, PlanStatus::Cancelled).is_ok());
        }
        assert!(validate_plan_transition(PlanStatus::Completed, PlanStatus::Cancelled).is_err());
        assert!(validate_plan_transition(PlanStatus::Cancelled, PlanStatus::Cancelled).is_err());
    }
}
