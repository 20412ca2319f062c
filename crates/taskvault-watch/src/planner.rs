//! Plan/approval production.
//!
//! [`PlanProducer`] is the seam for whatever generates plan content. The
//! built-in [`ChecklistPlanner`] derives a keyword-driven checklist and, when
//! the item names a sender, drafts a reply for human approval.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use taskvault_core::fsops::{sanitize_filename, timestamp_now};
use taskvault_core::{Plan, PlanStep, Priority, Stage, StageStore, Task, TaskStatus};
use tracing::{info, warn};

use crate::error::WatchError;
use crate::intake::parse_front_matter;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());
static SENDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*From:\*\*\s*(.+)").unwrap());

const URGENT_WORDS: [&str; 3] = ["urgent", "asap", "immediately"];

/// Artifacts written for one task.
#[derive(Debug, Clone)]
pub struct Produced {
    pub plan: PathBuf,
    pub approval: Option<PathBuf>,
}

/// Turns a task into a plan artifact and, optionally, an approval request.
#[async_trait]
pub trait PlanProducer: Send + Sync {
    async fn produce(&self, task: &mut Task) -> Result<Produced, WatchError>;
}

/// Build a [`Task`] from an item's path and text.
///
/// Title comes from the first `# ` heading, then the trigger front matter,
/// then the file stem.
pub fn task_from_item(path: &Path, content: &str) -> Task {
    let title = HEADING
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .or_else(|| parse_front_matter(content).map(|m| m.filename))
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    let lower = content.to_lowercase();
    let priority = if URGENT_WORDS.iter().any(|w| lower.contains(w)) {
        Priority::High
    } else {
        Priority::Medium
    };

    Task::new(path, title, content, priority)
}

/// The `**From:**` line of an item, if any.
pub fn sender_of(content: &str) -> Option<String> {
    SENDER
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Keyword-driven checklist. Always ends with an archive step.
pub fn checklist_for(content: &str) -> Vec<PlanStep> {
    let lower = content.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let mut steps = Vec::new();

    if has_any(&["meeting", "schedule", "appointment"]) {
        steps.push(PlanStep::new("Check calendar for available slots"));
        steps.push(PlanStep::new("Propose meeting times to participants"));
        steps.push(PlanStep::new("Schedule confirmed meeting"));
    }
    if has_any(&["report", "summary", "analysis"]) {
        steps.push(PlanStep::new("Gather required data"));
        steps.push(PlanStep::new("Analyze the data"));
        steps.push(PlanStep::new("Draft the report"));
        steps.push(PlanStep::new("Review and finalize report"));
    }
    if has_any(&["follow up", "follow-up", "check in"]) {
        steps.push(PlanStep::new("Identify the person to follow up with"));
        steps.push(PlanStep::new("Prepare follow-up message"));
        steps.push(PlanStep::new("Send follow-up communication"));
    }
    if has_any(&URGENT_WORDS) {
        steps.push(PlanStep::new("Prioritize this task"));
        steps.push(PlanStep::new("Address the urgent matter immediately"));
    }
    if steps.is_empty() {
        steps.push(PlanStep::new("Review the request in detail"));
        steps.push(PlanStep::new("Determine the appropriate response"));
        steps.push(PlanStep::new("Execute the required action"));
        steps.push(PlanStep::new("Confirm completion"));
    }
    steps.push(PlanStep::new("Mark task as completed and archive"));
    steps
}

pub fn render_plan(plan: &Plan, task: &Task) -> String {
    let mut out = format!("# Plan for: {}\n\n", plan.title);
    out.push_str(&format!("**Task ID:** {}\n", task.id));
    out.push_str(&format!(
        "**Created:** {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("**Status:** {}\n", plan.status));
    out.push_str(&format!("**Priority:** {}\n", task.priority));
    if let Some(minutes) = plan.estimated_minutes {
        out.push_str(&format!("**Estimated Duration:** {} minutes\n", minutes));
    }
    out.push_str(&format!(
        "\n## Description\nAction plan generated for task: {}\n\n## Action Steps\n\n",
        plan.title
    ));
    for step in plan.steps() {
        let mark = if step.completed { "x" } else { " " };
        out.push_str(&format!("- [{}] {}\n", mark, step.description));
    }
    out.push_str("\n## Completion\n\n- [ ] Review and approve plan\n- [ ] Execute all steps\n- [ ] Mark task as completed\n");
    out
}

/// Reply draft in the action-file grammar: header lines, a blank line, body.
pub fn render_reply_draft(sender: &str, subject: &str) -> String {
    let name = sender
        .split('<')
        .next()
        .map(|n| n.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|n| !n.is_empty() && !n.contains('@'));
    let greeting = match name {
        Some(name) => format!("Dear {},", name),
        None => "Hello,".to_string(),
    };
    format!(
        "type: email_send\nto: {sender}\nsubject: Re: {subject}\n\n{greeting}\n\nThank you for reaching out regarding \"{subject}\".\n\nI have received your message and am reviewing the details. I will get back to you with a full response shortly.\n\nBest regards\n"
    )
}

/// Writes `PLAN_<ts>_<stem>.md` and, for items with a sender,
/// `APPROVAL_<ts>_<stem>.txt`. Either both land or neither does.
pub struct ChecklistPlanner {
    store: Arc<dyn StageStore>,
}

impl ChecklistPlanner {
    pub fn new(store: Arc<dyn StageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PlanProducer for ChecklistPlanner {
    async fn produce(&self, task: &mut Task) -> Result<Produced, WatchError> {
        let steps = checklist_for(&task.content);
        let estimate = (steps.len() as u32) * 10;
        let plan = Plan::new(task, steps, Some(estimate));

        let stem = task
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| task.id.to_string());
        let safe_stem = sanitize_filename(&stem);
        let stamp = timestamp_now();

        // The plan is the dedup marker, so it is written last.
        let approval = match sender_of(&task.content) {
            Some(sender) => {
                let path = self.store.write_new(
                    Stage::PendingApproval,
                    &format!("APPROVAL_{}_{}.txt", stamp, safe_stem),
                    &render_reply_draft(&sender, &task.title),
                )?;
                info!(approval = %path.display(), "Created approval request");
                Some(path)
            }
            None => None,
        };

        let plan_path = match self.store.write_new(
            Stage::Plans,
            &format!("PLAN_{}_{}.md", stamp, safe_stem),
            &render_plan(&plan, task),
        ) {
            Ok(path) => path,
            Err(e) => {
                if let Some(draft) = &approval {
                    if let Err(remove_err) = std::fs::remove_file(draft) {
                        warn!(approval = %draft.display(), error = %remove_err, "Cannot remove orphaned reply draft");
                    }
                }
                return Err(e.into());
            }
        };
        info!(plan = %plan_path.display(), task = %task.title, "Created plan");

        task.advance(TaskStatus::Planned)
            .map_err(|e| WatchError::Producer(e.to_string()))?;
        Ok(Produced {
            plan: plan_path,
            approval,
        })
    }
}
