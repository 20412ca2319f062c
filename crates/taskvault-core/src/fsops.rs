//! Relocation and filename utilities shared by every stage.
//!
//! `safe_move` is the only way artifacts change directory. It never
//! overwrites an existing destination unless asked to, and it never loses
//! the source: a failed move leaves the file where it was.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::error::{Result, VaultError};

/// Format used for collision suffixes and generated artifact names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const MAX_FILENAME_LEN: usize = 250;

#[cfg(unix)]
const EXDEV: i32 = 18;

/// Current local time rendered with [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Split a file name into stem and extension (extension includes the dot).
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => (&name[..idx], &name[idx..]),
    }
}

/// Choose a destination path in `dest_dir` that does not exist yet.
///
/// The plain name is preferred; on collision the stem gets a timestamp
/// suffix, then a counter if the timestamped name is also taken.
pub fn unique_destination(dest_dir: &Path, file_name: &str) -> PathBuf {
    let plain = dest_dir.join(file_name);
    if !plain.exists() {
        return plain;
    }

    let (stem, ext) = split_name(file_name);
    let stamp = timestamp_now();
    let stamped = dest_dir.join(format!("{}_{}{}", stem, stamp, ext));
    if !stamped.exists() {
        return stamped;
    }

    let mut counter = 1u32;
    loop {
        let candidate = dest_dir.join(format!("{}_{}_{}{}", stem, stamp, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Move `source` into `dest_dir`, keeping its file name where possible.
///
/// With `overwrite == false` a name collision is resolved by suffixing the
/// destination (see [`unique_destination`]). Returns the final path.
pub fn safe_move(source: &Path, dest_dir: &Path, overwrite: bool) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| VaultError::InvalidName(source.display().to_string()))?;

    if !source.is_file() {
        return Err(VaultError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source does not exist: {}", source.display()),
        )));
    }

    std::fs::create_dir_all(dest_dir)?;

    let dest = if overwrite {
        dest_dir.join(file_name)
    } else {
        unique_destination(dest_dir, file_name)
    };

    rename_or_copy(source, &dest)?;

    if dest.file_name().and_then(|n| n.to_str()) != Some(file_name) {
        info!(
            from = %source.display(),
            to = %dest.display(),
            "Destination name taken, moved with suffix"
        );
    } else {
        debug!(from = %source.display(), to = %dest.display(), "Moved file");
    }
    Ok(dest)
}

fn rename_or_copy(source: &Path, dest: &Path) -> Result<()> {
    match std::fs::rename(source, dest) {
        Ok(()) => Ok(()),
        #[cfg(unix)]
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            // Different filesystems: copy, then drop the source only once the
            // copy is complete.
            std::fs::copy(source, dest)?;
            std::fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace characters that are invalid on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| (*c as u32) >= 32)
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    if cleaned.chars().count() <= MAX_FILENAME_LEN {
        return cleaned;
    }

    let (stem, ext) = split_name(&cleaned);
    let keep = MAX_FILENAME_LEN.saturating_sub(ext.chars().count());
    let truncated: String = stem.chars().take(keep).collect();
    format!("{}{}", truncated, ext)
}

/// Reject names that would address anything but a direct child of a stage.
pub fn validate_item_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(VaultError::InvalidName(name.to_string()));
    }
    Ok(())
}
