//! Atomic file writing.
//!
//! Content goes to a temporary file in the target directory and is then
//! renamed over the destination, so readers never observe a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::workspace::resolve;
use crate::{AppError, Result};

/// Write `content` to `rel_path` under `root`, creating parent directories.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if the path escapes the root and
/// `AppError::Io` on directory creation, write, or rename failures.
pub fn write_atomic(root: &Path, rel_path: &str, content: &str) -> Result<PathBuf> {
    let target = resolve(root, rel_path)?.absolute;

    let parent = target
        .parent()
        .ok_or_else(|| AppError::Io("file path has no parent directory".into()))?;
    std::fs::create_dir_all(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create parent directories for {}: {err}",
            target.display()
        ))
    })?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;
    tmp.write_all(content.as_bytes())
        .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;
    tmp.persist(&target).map_err(|err| {
        AppError::Io(format!("failed to persist {}: {err}", target.display()))
    })?;

    Ok(target)
}
