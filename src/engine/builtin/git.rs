//! Git plumbing through the `git` binary.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::models::CommitInfo;
use crate::{AppError, Result};

const WALK_LIMIT: usize = 5_000;
const SKIPPED_DIRS: [&str; 4] = ["target", "node_modules", "__pycache__", "dist"];

async fn git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| AppError::Engine(format!("failed to run git: {err}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(AppError::Engine(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Tracked files of the repository at `root`, or a bounded directory walk
/// when `root` is not a repository.
pub async fn list_files(root: &Path) -> Vec<String> {
    match git(root, &["ls-files", "-z"]).await {
        Ok(listing) => {
            let mut files: Vec<String> = listing
                .split('\0')
                .filter(|path| !path.is_empty())
                .map(str::to_owned)
                .collect();
            files.sort();
            files
        }
        Err(err) => {
            debug!(error = %err, "git ls-files unavailable, walking the tree");
            let root = root.to_path_buf();
            tokio::task::spawn_blocking(move || walk(&root))
                .await
                .unwrap_or_default()
        }
    }
}

fn walk(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
                if files.len() >= WALK_LIMIT {
                    files.sort();
                    return files;
                }
            }
        }
    }

    files.sort();
    files
}

/// Whether `root` lies inside a git work tree.
pub async fn is_repo(root: &Path) -> bool {
    git(root, &["rev-parse", "--is-inside-work-tree"])
        .await
        .is_ok_and(|out| out.trim() == "true")
}

/// Whether the work tree has uncommitted changes.
///
/// # Errors
///
/// Returns `AppError::Engine` if `git status` fails.
pub async fn is_dirty(root: &Path) -> Result<bool> {
    Ok(!git(root, &["status", "--porcelain"]).await?.trim().is_empty())
}

/// Commit `files` (or every change when empty) with `message`.
///
/// Returns `None` when there was nothing to commit.
///
/// # Errors
///
/// Returns `AppError::Engine` if staging or committing fails.
pub async fn commit(root: &Path, files: &[String], message: &str) -> Result<Option<CommitInfo>> {
    if files.is_empty() {
        git(root, &["add", "-A"]).await?;
    } else {
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        git(root, &args).await?;
    }

    let staged = git(root, &["diff", "--cached", "--name-only"]).await?;
    if staged.trim().is_empty() {
        return Ok(None);
    }

    git(root, &["commit", "--no-verify", "-m", message]).await?;
    let hash = git(root, &["rev-parse", "HEAD"]).await?.trim().to_owned();

    Ok(Some(CommitInfo {
        hash,
        message: message.to_owned(),
    }))
}

/// Diff of `hash` against its parent; root commits show their full patch.
///
/// # Errors
///
/// Returns `AppError::Engine` if git cannot produce either form.
pub async fn commit_diff(root: &Path, hash: &str) -> Result<String> {
    let parent = format!("{hash}~1");
    match git(root, &["diff", &parent, hash]).await {
        Ok(diff) => Ok(diff),
        Err(_) => git(root, &["show", "--format=", hash]).await,
    }
}

/// Abbreviated commit hash for status lines.
#[must_use]
pub fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}
