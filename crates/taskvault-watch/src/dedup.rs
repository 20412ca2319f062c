//! Name-based duplicate detection.
//!
//! Best effort only: the key is derived from the file name, not the content,
//! and matching is a substring search over existing plan names. Two unrelated
//! items whose keys overlap are treated as duplicates. A producer racing the
//! check for the same source can still slip through.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use taskvault_core::fsops::sanitize_filename;
use taskvault_core::{Stage, StageStore, VaultError};
use tracing::info;

/// Trailing decorations that do not change the logical identity of an item:
/// copy markers, `(N)` counters, collision timestamps and trigger suffixes.
static DECORATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[ _-]copy(?:[ _-]?\d+)?|\s*\(\d+\)|_\d{8}_\d{6}(?:_\d+)?|_trigger)$")
        .unwrap()
});

/// Derive the dedup key for an item path.
pub fn dedup_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut key = sanitize_filename(stem.trim());

    loop {
        let stripped = DECORATION.replace(&key, "").into_owned();
        if stripped == key || stripped.is_empty() {
            break;
        }
        key = stripped;
    }
    key
}

/// Checks whether an item already has a plan.
pub struct DedupGate {
    store: Arc<dyn StageStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn StageStore>) -> Self {
        Self { store }
    }

    /// `Ok(false)` when a plan for the same key already exists.
    ///
    /// An error means the check could not be made; callers leave the item in
    /// place for the next pass.
    pub fn should_process(&self, path: &Path) -> Result<bool, VaultError> {
        let key = dedup_key(path);
        match self.store.find_containing(Stage::Plans, &key)? {
            Some(existing) => {
                info!(
                    item = %path.display(),
                    key = %key,
                    plan = %existing,
                    "Duplicate item, plan already exists"
                );
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
