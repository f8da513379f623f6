//! Messages sent to the controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ContextEntry, ModelInfo};

/// Log-channel severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational line.
    Info,
    /// Non-fatal warning.
    Warning,
    /// Failure surfaced to the user.
    Error,
    /// Progress indicator; `finished` closes it.
    Loading,
}

/// Log-channel payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogMessage {
    /// Severity.
    pub level: LogLevel,
    /// Text.
    pub message: String,
    /// Closes a loading indicator.
    pub finished: bool,
}

/// Streaming response event.
///
/// Partial events carry one chunk with `finished: false`; the terminal event
/// of an exchange carries the full text and the exchange's results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    /// Whether this closes the exchange (or the architect phase).
    pub finished: bool,
    /// Chunk or full text.
    pub content: String,
    /// Files edited during the exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_files: Option<Vec<String>>,
    /// Human-readable token and cost summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_report: Option<String>,
    /// Commit made during the exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Message of that commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Diff of that commit against its parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Reflection prompt this exchange answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflected_message: Option<String>,
}

impl ResponseEvent {
    /// Partial chunk event.
    #[must_use]
    pub fn chunk(content: &str, reflected_message: Option<&str>) -> Self {
        Self {
            finished: false,
            content: content.to_owned(),
            reflected_message: reflected_message.map(str::to_owned),
            ..Self::default()
        }
    }
}

/// Active model broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelsUpdate {
    /// Main model name.
    pub main_model: String,
    /// Weak model name.
    pub weak_model: String,
    /// Reasoning effort, if set.
    pub reasoning_effort: Option<String>,
    /// Thinking token budget, if set.
    pub thinking_tokens: Option<String>,
    /// Edit format of the primary session.
    pub edit_format: String,
    /// Pricing and capacity.
    pub info: ModelInfo,
    /// Missing-key error, if any.
    pub error: Option<String>,
}

/// Tokens and cost of one context component.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenCost {
    /// Estimated tokens.
    pub tokens: usize,
    /// Estimated prompt cost in dollars.
    pub cost: f64,
}

/// Context budget breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokensInfo {
    /// System prompt boilerplate.
    pub system_messages: TokenCost,
    /// Full conversation history.
    pub chat_history: TokenCost,
    /// Repository summary.
    pub repo_map: TokenCost,
    /// Each tracked file keyed by relative path.
    pub files: BTreeMap<String, TokenCost>,
}

/// Action messages sent to the controller, tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Capability announcement sent once after connecting.
    Init {
        /// Project root.
        base_dir: String,
        /// Inbound actions this bridge handles.
        listen_to: Vec<String>,
        /// Input history file, if configured.
        input_history_file: Option<String>,
    },
    /// Tracked file set changed.
    UpdateContextFiles {
        /// Editable files followed by read-only files.
        files: Vec<ContextEntry>,
    },
    /// Active model changed.
    SetModels(ModelsUpdate),
    /// Repository summary recomputed.
    UpdateRepoMap {
        /// Map text without its prompt prefix.
        repo_map: String,
    },
    /// Autocompletion vocabulary.
    UpdateAutocompletion {
        /// Completion words.
        words: Vec<String>,
        /// Every file in the project.
        all_files: Vec<String>,
        /// Known model names.
        models: Vec<String>,
    },
    /// Streaming response event.
    Response(ResponseEvent),
    /// Context budget breakdown.
    TokensInfo {
        /// Breakdown.
        info: TokensInfo,
    },
    /// Confirmation request.
    AskQuestion {
        /// Question text.
        question: String,
        /// What the question is about.
        subject: Option<String>,
        /// Whether the answer may be remembered for the group.
        is_group_question: bool,
        /// Suggested answer.
        default_answer: String,
    },
    /// External command status.
    UseCommandOutput {
        /// Command line.
        command: String,
        /// Whether the command has finished.
        finished: bool,
    },
    /// A prompt with a correlation id has completed.
    PromptFinished {
        /// Correlation id from the `prompt` action.
        prompt_id: String,
    },
}
