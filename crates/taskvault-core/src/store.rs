//! Persistence adapter for staged artifacts.
//!
//! Components never build stage paths by hand; they go through a
//! [`StageStore`], which validates the transition and performs the move via
//! an atomic rename. The rename is the claim: two workers racing for the same
//! item see exactly one success and one `NotFound`.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{Result, VaultError};
use crate::fsops::{safe_move, unique_destination, validate_item_name};
use crate::layout::{Stage, VaultLayout};
use crate::state_machine::validate_stage_transition;

pub trait StageStore: Send + Sync {
    fn layout(&self) -> &VaultLayout;

    /// File names in `stage`, sorted.
    fn list(&self, stage: Stage) -> Result<Vec<String>>;

    fn read(&self, stage: Stage, name: &str) -> Result<String>;

    /// Create a new artifact. An existing name is never replaced; the new
    /// artifact gets a suffixed name instead. Returns the written path.
    fn write_new(&self, stage: Stage, name: &str, content: &str) -> Result<PathBuf>;

    /// Move `name` from one stage to another.
    fn transition(&self, name: &str, from: Stage, to: Stage) -> Result<PathBuf>;

    /// First artifact in `stage` whose name contains `key`.
    fn find_containing(&self, stage: Stage, key: &str) -> Result<Option<String>>;
}

/// [`StageStore`] backed by the vault directories.
#[derive(Debug, Clone)]
pub struct FsStageStore {
    layout: VaultLayout,
}

impl FsStageStore {
    pub fn new(layout: VaultLayout) -> Self {
        Self { layout }
    }
}

impl StageStore for FsStageStore {
    fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    fn list(&self, stage: Stage) -> Result<Vec<String>> {
        let dir = self.layout.dir(stage);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, stage: Stage, name: &str) -> Result<String> {
        validate_item_name(name)?;
        let path = self.layout.path_of(stage, name);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaultError::NotFound {
                stage,
                name: name.to_string(),
            },
            _ => VaultError::Io(e),
        })
    }

    fn write_new(&self, stage: Stage, name: &str, content: &str) -> Result<PathBuf> {
        validate_item_name(name)?;
        let dir = self.layout.dir(stage);
        std::fs::create_dir_all(&dir)?;
        let path = unique_destination(&dir, name);
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(content.as_bytes())?;
        debug!(path = %path.display(), "Wrote artifact");
        Ok(path)
    }

    fn transition(&self, name: &str, from: Stage, to: Stage) -> Result<PathBuf> {
        validate_stage_transition(from, to)?;
        validate_item_name(name)?;
        let source = self.layout.path_of(from, name);
        let not_found = || VaultError::NotFound {
            stage: from,
            name: name.to_string(),
        };
        if !source.is_file() {
            return Err(not_found());
        }
        match safe_move(&source, &self.layout.dir(to), false) {
            Err(VaultError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            other => other,
        }
    }

    fn find_containing(&self, stage: Stage, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .list(stage)?
            .into_iter()
            .find(|name| name.contains(key)))
    }
}
