//! Vault layout: the fixed set of stage directories.
//!
//! Every artifact lives in exactly one stage directory at a time. The
//! directory names are part of the operator contract and never change.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// A task-lifecycle stage, backed by one directory under the vault root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Inbox,
    NeedsAction,
    Plans,
    PendingApproval,
    Approved,
    Done,
    Logs,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Inbox,
        Stage::NeedsAction,
        Stage::Plans,
        Stage::PendingApproval,
        Stage::Approved,
        Stage::Done,
        Stage::Logs,
    ];

    /// Directory name on disk.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Inbox => "Inbox",
            Stage::NeedsAction => "Needs_Action",
            Stage::Plans => "Plans",
            Stage::PendingApproval => "Pending_Approval",
            Stage::Approved => "Approved",
            Stage::Done => "Done",
            Stage::Logs => "Logs",
        }
    }

    /// Stages whose contents are pipeline output. A watcher on a parent
    /// directory must not re-trigger on these.
    pub fn restricted() -> &'static [Stage] {
        &[Stage::Plans, Stage::PendingApproval, Stage::Done]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.dir_name() == s)
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Resolved stage directories for one vault root.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn path_of(&self, stage: Stage, name: &str) -> PathBuf {
        self.dir(stage).join(name)
    }

    /// Create every stage directory that does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        for stage in Stage::ALL {
            let dir = self.dir(stage);
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!(path = %dir.display(), "Created stage directory");
            }
        }
        Ok(())
    }

    /// Which stage directory directly contains `path`, if any.
    pub fn stage_of(&self, path: &Path) -> Option<Stage> {
        let parent = path.parent()?;
        Stage::ALL.into_iter().find(|stage| parent == self.dir(*stage))
    }
}
