//! Coding-engine abstraction.
//!
//! The [`Engine`] trait is the narrow contract between the coordination
//! core and whatever produces replies, applies edits, and summarizes the
//! repository. The core never reaches inside an engine: it consumes the
//! reply stream, forwards chunks, and applies the final [`ReplyOutcome`] to
//! the session itself.

pub mod builtin;
pub mod decorate;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use futures_util::Stream;

use crate::io::ConnectorIo;
use crate::models::{ChatMessage, CommitInfo, ModelDescriptor, Session};
use crate::Result;

pub use decorate::{CommandStatusTestRunner, LoadingLinter};

/// Boxed `Send` future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lazy, single-pass reply sequence.
pub type ReplyStream<'a> = Pin<Box<dyn Stream<Item = Result<ReplyEvent>> + Send + 'a>>;

/// Fixed token estimate for an attached image.
pub const IMAGE_TOKENS: usize = 765;

/// Item of a [`ReplyStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// Incremental text.
    Chunk(String),
    /// Terminal result; always the last item when the engine finishes.
    Done(ReplyOutcome),
}

/// What an exchange produced besides its streamed text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyOutcome {
    /// Full reply text; used when the engine streamed nothing.
    pub content: String,
    /// Files edited by the reply, relative to the root.
    pub edited_files: Vec<String>,
    /// Human-readable usage summary.
    pub usage_report: Option<String>,
    /// Cost of this exchange in dollars.
    pub cost: f64,
    /// Commit made for the reply's edits.
    pub commit: Option<CommitInfo>,
    /// Follow-up instruction to run as a new prompt.
    pub reflected_message: Option<String>,
    /// Turns to settle after the exchange (e.g. accepted command output).
    pub extra_messages: Vec<ChatMessage>,
}

/// Search/replace edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    /// Target path relative to the root.
    pub path: String,
    /// Text to find; empty creates or appends.
    pub original: String,
    /// Replacement text.
    pub updated: String,
}

/// Output of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line that ran.
    pub command: String,
    /// Combined stdout and stderr.
    pub output: String,
    /// Whether the command exited successfully.
    pub success: bool,
}

/// Contract the coordination core drives.
pub trait Engine: Send + Sync {
    /// Stream a reply to `prompt` for `session`.
    ///
    /// The stream yields chunks followed by one [`ReplyEvent::Done`]. The
    /// engine may ask questions through `io` while the stream is suspended.
    fn run_stream<'a>(
        &'a self,
        session: &'a Session,
        prompt: &'a str,
        io: &'a ConnectorIo,
    ) -> ReplyStream<'a>;

    /// Run a slash command against `session`.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails in a way the user must see.
    fn run_command<'a>(
        &'a self,
        session: &'a mut Session,
        line: &'a str,
        io: &'a ConnectorIo,
    ) -> BoxFuture<'a, Result<()>>;

    /// Apply search/replace edits and return the edited paths.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Edit`](crate::AppError::Edit) on the first edit
    /// that cannot be applied; earlier edits stay applied.
    fn apply_edits<'a>(
        &'a self,
        session: &'a Session,
        edits: &'a [EditBlock],
        io: &'a ConnectorIo,
    ) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Repository summary excluding `chat_files`, prefixed by
    /// [`Engine::repo_content_prefix`]; `None` when disabled or empty.
    fn repo_map<'a>(
        &'a self,
        session: &'a Session,
        chat_files: &'a [String],
    ) -> BoxFuture<'a, Option<String>>;

    /// Drop cached repository summaries.
    fn refresh_repo_map(&self);

    /// Prompt boilerplate that precedes every repo map.
    fn repo_content_prefix(&self) -> &str;

    /// System prompt for `session`.
    fn system_prompt(&self, session: &Session) -> String;

    /// Every file in the project, relative to `root`.
    fn all_files<'a>(&'a self, root: &'a Path) -> BoxFuture<'a, Vec<String>>;

    /// Diff of `hash` against its parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot produce the diff.
    fn commit_diff<'a>(&'a self, root: &'a Path, hash: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Lines describing the engine setup for `session`.
    fn announcements(&self, session: &Session) -> Vec<String>;

    /// Estimated tokens of `text` for `model`.
    fn token_count(&self, _model: &ModelDescriptor, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// Estimated tokens of the image at `path`.
    fn image_token_count(&self, _path: &Path) -> usize {
        IMAGE_TOKENS
    }
}

/// Lints edited files.
pub trait Linter: Send + Sync {
    /// Lint `files` under `root`; `Some(report)` when problems were found.
    ///
    /// # Errors
    ///
    /// Returns an error if the linter could not run.
    fn lint<'a>(
        &'a self,
        io: &'a ConnectorIo,
        root: &'a Path,
        files: &'a [String],
    ) -> BoxFuture<'a, Result<Option<String>>>;
}

/// Runs the project's test command.
pub trait TestRunner: Send + Sync {
    /// Run `command` in `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be started.
    fn run_tests<'a>(
        &'a self,
        io: &'a ConnectorIo,
        root: &'a Path,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>>;
}

/// Roughly four characters per token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
