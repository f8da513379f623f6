//! Search/replace edit blocks.
//!
//! Replies carry edits as
//!
//! ```text
//! path/to/file.rs
//! <<<<<<< SEARCH
//! old text
//! =======
//! new text
//! >>>>>>> REPLACE
//! ```
//!
//! optionally wrapped in a code fence. An empty search section creates the
//! file or appends to it.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::engine::EditBlock;
use crate::workspace::{resolve, write_atomic};
use crate::{AppError, Result};

pub(crate) const SEARCH_MARK: &str = "<<<<<<< SEARCH";
pub(crate) const DIVIDER_MARK: &str = "=======";
pub(crate) const REPLACE_MARK: &str = ">>>>>>> REPLACE";

fn divider_regex() -> Option<&'static Regex> {
    static DIVIDER: OnceLock<Option<Regex>> = OnceLock::new();
    DIVIDER
        .get_or_init(|| Regex::new(r"^={5,9}\s*$").ok())
        .as_ref()
}

fn is_divider(line: &str) -> bool {
    divider_regex().map_or(line.trim_end() == DIVIDER_MARK, |re| re.is_match(line))
}

fn is_search(line: &str) -> bool {
    let line = line.trim();
    line == SEARCH_MARK || (line.starts_with("<<<<<<<") && line.ends_with("SEARCH"))
}

fn is_replace(line: &str) -> bool {
    let line = line.trim();
    line == REPLACE_MARK || (line.starts_with(">>>>>>>") && line.ends_with("REPLACE"))
}

/// Extract every well-formed edit block from `text`.
///
/// The file name is the nearest non-fence line above the search marker;
/// blocks without one reuse the previous block's file. Unterminated blocks
/// are ignored.
#[must_use]
pub fn parse_edit_blocks(text: &str) -> Vec<EditBlock> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut last_path: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        if !is_search(lines[i]) {
            i += 1;
            continue;
        }

        let path = lines[..i]
            .iter()
            .rev()
            .take(3)
            .take_while(|line| !is_replace(line))
            .map(|line| clean_path_line(line))
            .find(|candidate| !candidate.is_empty())
            .or_else(|| last_path.clone());

        let mut original = Vec::new();
        let mut updated = Vec::new();
        let mut j = i + 1;
        while j < lines.len() && !is_divider(lines[j]) {
            original.push(lines[j]);
            j += 1;
        }
        j += 1;
        while j < lines.len() && !is_replace(lines[j]) {
            updated.push(lines[j]);
            j += 1;
        }

        if j >= lines.len() {
            break;
        }

        if let Some(path) = path {
            blocks.push(EditBlock {
                path: path.clone(),
                original: join_lines(&original),
                updated: join_lines(&updated),
            });
            last_path = Some(path);
        }
        i = j + 1;
    }

    blocks
}

fn clean_path_line(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.starts_with("```")
        || trimmed == DIVIDER_MARK
        || trimmed.contains(char::is_whitespace)
    {
        return String::new();
    }
    let candidate = trimmed.trim_matches(|c| c == '`' || c == '*' || c == ':');
    if candidate.chars().any(char::is_alphanumeric) {
        candidate.to_owned()
    } else {
        String::new()
    }
}

fn join_lines(lines: &[&str]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        let mut joined = lines.join("\n");
        joined.push('\n');
        joined
    }
}

/// Apply one search/replace to `content`.
///
/// Tries an exact match first, then a match that ignores trailing
/// whitespace on each line. An empty `original` appends `updated`.
///
/// # Errors
///
/// Returns `AppError::Edit` when `original` is not found.
pub fn replace_once(content: &str, original: &str, updated: &str) -> Result<String> {
    if original.trim().is_empty() {
        let mut result = content.to_owned();
        if !result.is_empty() && !result.ends_with('\n') {
            result.push('\n');
        }
        result.push_str(updated);
        return Ok(result);
    }

    if let Some(pos) = content.find(original) {
        let mut result = String::with_capacity(content.len() + updated.len());
        result.push_str(&content[..pos]);
        result.push_str(updated);
        result.push_str(&content[pos + original.len()..]);
        return Ok(result);
    }

    replace_loose(content, original, updated).ok_or_else(|| {
        AppError::Edit(format!("search text not found:\n{}", original.trim_end()))
    })
}

fn replace_loose(content: &str, original: &str, updated: &str) -> Option<String> {
    let content_lines: Vec<&str> = content.lines().collect();
    let wanted: Vec<&str> = original.lines().map(str::trim_end).collect();
    if wanted.is_empty() || wanted.len() > content_lines.len() {
        return None;
    }

    let start = (0..=content_lines.len() - wanted.len()).find(|&start| {
        content_lines[start..start + wanted.len()]
            .iter()
            .zip(&wanted)
            .all(|(have, want)| have.trim_end() == *want)
    })?;

    let mut result: Vec<String> = content_lines[..start]
        .iter()
        .map(|line| (*line).to_owned())
        .collect();
    result.extend(updated.lines().map(str::to_owned));
    result.extend(
        content_lines[start + wanted.len()..]
            .iter()
            .map(|line| (*line).to_owned()),
    );

    let mut joined = result.join("\n");
    if content.ends_with('\n') {
        joined.push('\n');
    }
    Some(joined)
}

/// Apply `blocks` in order under `root` and return the edited paths.
///
/// Each block rewrites its file atomically. Missing files are created only
/// by blocks with an empty search section.
///
/// # Errors
///
/// Returns `AppError::Edit` or `AppError::PathViolation` for the first block
/// that fails; earlier blocks stay applied.
pub fn apply_blocks(root: &Path, blocks: &[EditBlock]) -> Result<Vec<String>> {
    let mut edited: Vec<String> = Vec::new();

    for block in blocks {
        let resolved = resolve(root, &block.path)?;
        let current = match std::fs::read_to_string(&resolved.absolute) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if !block.original.trim().is_empty() {
                    return Err(AppError::Edit(format!("{} does not exist", resolved.relative)));
                }
                String::new()
            }
            Err(err) => {
                return Err(AppError::Io(format!(
                    "failed to read {}: {err}",
                    resolved.relative
                )))
            }
        };

        let next = replace_once(&current, &block.original, &block.updated).map_err(|err| match err {
            AppError::Edit(msg) => AppError::Edit(format!("{}: {msg}", resolved.relative)),
            other => other,
        })?;
        write_atomic(root, &resolved.relative, &next)?;

        if !edited.contains(&resolved.relative) {
            edited.push(resolved.relative);
        }
    }

    Ok(edited)
}
