//! Project-root path handling and atomic file writes.

pub mod writer;

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

pub use writer::write_atomic;

/// Path resolved under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path.
    pub absolute: PathBuf,
    /// Path relative to the root with `/` separators.
    pub relative: String,
}

/// Resolve `candidate` (relative or absolute) under `root`.
///
/// Normalizes `.` and `..`, rejects anything that escapes the root, and
/// follows symlinks of existing paths to make sure they stay inside.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - The root cannot be canonicalized.
/// - The candidate uses `..` to climb above the root.
/// - The resolved path does not start with the root.
/// - An existing path is a symlink whose target escapes the root.
pub fn resolve(root: &Path, candidate: impl AsRef<Path>) -> Result<ResolvedPath> {
    let root = root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("project root invalid: {err}")))?;

    let mut normalized = PathBuf::new();
    for component in candidate.as_ref().components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(AppError::PathViolation(
                        "path attempts to escape the project root".into(),
                    ));
                }
            }
            Component::CurDir => {}
            Component::Prefix(_) => {
                normalized.clear();
                normalized.push(component.as_os_str());
            }
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }

    let absolute = if normalized.is_absolute() {
        normalized
    } else {
        root.join(normalized)
    };

    if !absolute.starts_with(&root) {
        return Err(AppError::PathViolation(format!(
            "{} is outside the project root",
            absolute.display()
        )));
    }

    let absolute = if absolute.exists() {
        let canonical = absolute
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;
        if !canonical.starts_with(&root) {
            return Err(AppError::PathViolation(
                "symlink target escapes the project root".into(),
            ));
        }
        canonical
    } else {
        absolute
    };

    let relative = relative_string(&root, &absolute)?;
    Ok(ResolvedPath { absolute, relative })
}

fn relative_string(root: &Path, absolute: &Path) -> Result<String> {
    let rel = absolute
        .strip_prefix(root)
        .map_err(|_| AppError::PathViolation("path outside the project root".into()))?;

    let parts: Vec<String> = rel
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        return Err(AppError::PathViolation(
            "path refers to the project root itself".into(),
        ));
    }

    Ok(parts.join("/"))
}
