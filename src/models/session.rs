//! Session model: conversation history, tracked file sets, and active model.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::model::ModelDescriptor;
use crate::AppError;

/// Assistant acknowledgement appended after synthetic user turns.
pub const ACKNOWLEDGEMENT: &str = "Ok.";

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
}

/// Single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author of the turn.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl ChatMessage {
    /// Build a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Build a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Edit mode of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Plain editing: replies carry edit blocks applied directly.
    Code,
    /// Question answering without edits.
    Ask,
    /// Two-phase mode: proposals are applied by an editor sub-session.
    Architect,
    /// Context discovery: suggests files, never edits.
    Context,
}

impl EditMode {
    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Ask => "ask",
            Self::Architect => "architect",
            Self::Context => "context",
        }
    }

    /// Whether replies in this mode may carry file edits.
    #[must_use]
    pub fn edits_files(self) -> bool {
        matches!(self, Self::Code | Self::Architect)
    }
}

impl FromStr for EditMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "code" => Ok(Self::Code),
            "ask" => Ok(Self::Ask),
            "architect" => Ok(Self::Architect),
            "context" => Ok(Self::Context),
            other => Err(AppError::InvalidInput(format!("unknown mode: {other}"))),
        }
    }
}

/// Commit created on behalf of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Commit message.
    pub message: String,
}

/// Tracked file as reported to the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    /// Path relative to the project root.
    pub path: String,
    /// Whether the file is attached read-only.
    pub read_only: bool,
}

/// Result of attaching a path to one of the file sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Path was not tracked before.
    Added,
    /// Path moved from the other set.
    Moved,
    /// Path already sat in the requested set.
    AlreadyPresent,
}

/// Running coding-agent instance.
///
/// Replaced rather than mutated when its model or mode changes; see
/// [`Session::derive`].
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier, regenerated on every replacement.
    pub id: String,
    /// Project root all tracked paths are relative to.
    pub root: PathBuf,
    /// Active model.
    pub model: ModelDescriptor,
    /// Edit mode.
    pub mode: EditMode,
    /// Edit format used by the engine's prompts.
    pub edit_format: String,
    /// Settled conversation.
    pub done_messages: Vec<ChatMessage>,
    /// Turns of the exchange currently in flight.
    pub cur_messages: Vec<ChatMessage>,
    /// Accumulated model cost in dollars.
    pub total_cost: f64,
    /// Hashes of every commit made by this session.
    pub commit_hashes: Vec<String>,
    /// Most recent commit.
    pub last_commit: Option<CommitInfo>,
    /// Offer shell commands suggested by the model.
    pub suggest_shell_commands: bool,
    /// Repo map budget; 0 disables the map for this session.
    pub map_tokens: usize,
    editable: Vec<String>,
    read_only: Vec<String>,
}

impl Session {
    /// Create an empty session rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf, model: ModelDescriptor, mode: EditMode, edit_format: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            root,
            model,
            mode,
            edit_format,
            done_messages: Vec::new(),
            cur_messages: Vec::new(),
            total_cost: 0.0,
            commit_hashes: Vec::new(),
            last_commit: None,
            suggest_shell_commands: true,
            map_tokens: 0,
            editable: Vec::new(),
            read_only: Vec::new(),
        }
    }

    /// Build a replacement session with a new model and mode.
    ///
    /// Conversation, file sets, cost and commit history carry over.
    #[must_use]
    pub fn derive(&self, mode: EditMode, model: ModelDescriptor, edit_format: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model,
            mode,
            edit_format,
            ..self.clone()
        }
    }

    /// Spawn the editor sub-session that applies an architect proposal.
    ///
    /// The sub-session starts with an empty conversation, no repo map and no
    /// shell suggestions, and inherits the accumulated cost.
    #[must_use]
    pub fn spawn_editor(&self) -> Self {
        let editor_model = self
            .model
            .editor
            .as_deref()
            .cloned()
            .unwrap_or_else(|| self.model.clone());
        let edit_format = self.model.editor_edit_format.clone();
        Self {
            id: Uuid::new_v4().to_string(),
            model: editor_model,
            mode: EditMode::Code,
            edit_format,
            done_messages: Vec::new(),
            cur_messages: Vec::new(),
            suggest_shell_commands: false,
            map_tokens: 0,
            ..self.clone()
        }
    }

    /// Settle the current exchange, optionally followed by a synthetic
    /// user turn and its acknowledgement.
    pub fn move_back_cur_messages(&mut self, message: Option<&str>) {
        self.done_messages.append(&mut self.cur_messages);
        if let Some(message) = message {
            self.done_messages.push(ChatMessage::user(message));
            self.done_messages.push(ChatMessage::assistant(ACKNOWLEDGEMENT));
        }
    }

    /// Record a finished exchange in the current segment.
    pub fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.cur_messages.push(ChatMessage::user(prompt));
        self.cur_messages.push(ChatMessage::assistant(reply));
    }

    /// Record an interrupted exchange directly into the settled history.
    pub fn settle_interrupted(&mut self, prompt: &str, partial: &str) {
        self.done_messages.append(&mut self.cur_messages);
        self.done_messages.push(ChatMessage::user(prompt));
        self.done_messages
            .push(ChatMessage::assistant(format!("{partial} (interrupted)")));
    }

    /// Record a commit and make it the last commit reference.
    pub fn record_commit(&mut self, commit: CommitInfo) {
        self.commit_hashes.push(commit.hash.clone());
        self.last_commit = Some(commit);
    }

    /// Drop the whole conversation.
    pub fn clear_conversation(&mut self) {
        self.done_messages.clear();
        self.cur_messages.clear();
    }

    /// Every turn, settled first.
    pub fn all_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.done_messages.iter().chain(self.cur_messages.iter())
    }

    /// Editable paths in insertion order.
    #[must_use]
    pub fn editable(&self) -> &[String] {
        &self.editable
    }

    /// Read-only paths in insertion order.
    #[must_use]
    pub fn read_only(&self) -> &[String] {
        &self.read_only
    }

    /// Attach `rel` as editable, removing it from the read-only set.
    pub fn add_editable(&mut self, rel: &str) -> AddOutcome {
        insert_exclusive(&mut self.editable, &mut self.read_only, rel)
    }

    /// Attach `rel` as read-only, removing it from the editable set.
    pub fn add_read_only(&mut self, rel: &str) -> AddOutcome {
        insert_exclusive(&mut self.read_only, &mut self.editable, rel)
    }

    /// Remove `rel` from whichever set holds it. Returns `false` when the
    /// path was not tracked.
    pub fn drop_path(&mut self, rel: &str) -> bool {
        let before = self.editable.len() + self.read_only.len();
        self.editable.retain(|path| path != rel);
        self.read_only.retain(|path| path != rel);
        before != self.editable.len() + self.read_only.len()
    }

    /// Detach every tracked file.
    pub fn drop_all(&mut self) {
        self.editable.clear();
        self.read_only.clear();
    }

    /// Whether `rel` is tracked in either set.
    #[must_use]
    pub fn is_tracked(&self, rel: &str) -> bool {
        self.editable.iter().chain(self.read_only.iter()).any(|p| p == rel)
    }

    /// Sorted, de-duplicated union of both file sets.
    #[must_use]
    pub fn tracked_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .editable
            .iter()
            .chain(self.read_only.iter())
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Context entries: editable files (sorted) followed by read-only files (sorted).
    #[must_use]
    pub fn context_entries(&self) -> Vec<ContextEntry> {
        let mut editable = self.editable.clone();
        editable.sort();
        let mut read_only = self.read_only.clone();
        read_only.sort();

        editable
            .into_iter()
            .map(|path| ContextEntry {
                path,
                read_only: false,
            })
            .chain(read_only.into_iter().map(|path| ContextEntry {
                path,
                read_only: true,
            }))
            .collect()
    }

    /// Absolute path of a tracked relative path.
    #[must_use]
    pub fn abs_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn insert_exclusive(target: &mut Vec<String>, other: &mut Vec<String>, rel: &str) -> AddOutcome {
    if target.iter().any(|path| path == rel) {
        return AddOutcome::AlreadyPresent;
    }

    let before = other.len();
    other.retain(|path| path != rel);
    target.push(rel.to_owned());

    if other.len() == before {
        AddOutcome::Added
    } else {
        AddOutcome::Moved
    }
}
