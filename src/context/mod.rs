//! Tracked file sets and the artifacts derived from them.
//!
//! [`attach_path`] and [`detach_path`] are the only ways the bridge and the
//! built-in commands change a session's file sets; [`ContextTracker`]
//! rebroadcasts what depends on them.

pub mod autocomplete;
pub mod tracker;

use crate::io::ConnectorIo;
use crate::models::{AddOutcome, Session};
use crate::workspace::resolve;
use crate::AppError;

pub use autocomplete::{initial_words, tokenize_files, TokenizePool};
pub use tracker::{ContextTracker, ModelOverrides, Recompute};

/// Attach `raw` (relative or absolute) to the session.
///
/// Paths outside the project root produce a warning and leave the sets
/// untouched. Returns `true` when a set changed.
pub fn attach_path(session: &mut Session, io: &ConnectorIo, raw: &str, read_only: bool) -> bool {
    let resolved = match resolve(session.root(), raw) {
        Ok(resolved) => resolved,
        Err(AppError::PathViolation(reason)) => {
            tracing::debug!(path = raw, %reason, "rejected path");
            io.tool_warning(&format!(
                "Can not add {raw}, which is not within {}",
                session.root().display()
            ));
            return false;
        }
        Err(err) => {
            io.tool_error(&err.to_string());
            return false;
        }
    };

    if resolved.absolute.is_dir() {
        io.tool_warning(&format!("Skipping {}, it is a directory", resolved.relative));
        return false;
    }
    if read_only && !resolved.absolute.exists() {
        io.tool_error(&format!("File {} does not exist", resolved.relative));
        return false;
    }

    let rel = resolved.relative;
    let outcome = if read_only {
        session.add_read_only(&rel)
    } else {
        session.add_editable(&rel)
    };

    match outcome {
        AddOutcome::AlreadyPresent => {
            let kind = if read_only { "a read-only" } else { "an editable" };
            io.tool_error(&format!("{rel} is already in the chat as {kind} file"));
            false
        }
        AddOutcome::Added | AddOutcome::Moved => {
            let suffix = if read_only { " (read-only)" } else { "" };
            io.tool_output(&format!("Added {rel} to the chat{suffix}"));
            true
        }
    }
}

/// Detach `raw` from whichever set holds it; untracked paths are a no-op.
///
/// Returns `true` when a set changed.
pub fn detach_path(session: &mut Session, io: &ConnectorIo, raw: &str) -> bool {
    let rel = if session.is_tracked(raw) {
        raw.to_owned()
    } else {
        match resolve(session.root(), raw) {
            Ok(resolved) => resolved.relative,
            Err(_) => return false,
        }
    };

    if session.drop_path(&rel) {
        io.tool_output(&format!("Removed {rel} from the chat"));
        true
    } else {
        false
    }
}
