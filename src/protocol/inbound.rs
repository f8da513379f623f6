//! Actions received from the controller.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::models::Role;
use crate::{AppError, Result};

/// Inbound actions handled by the bridge; announced in `init.listenTo`.
pub const KNOWN_ACTIONS: [&str; 10] = [
    "prompt",
    "add-file",
    "drop-file",
    "answer-question",
    "set-models",
    "run-command",
    "add-message",
    "interrupt-response",
    "apply-edits",
    "update-env-vars",
];

/// `prompt` payload.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Prompt text; empty means no-op.
    #[serde(default)]
    pub prompt: String,
    /// Edit mode for this prompt only.
    #[serde(default)]
    pub mode: Option<String>,
    /// Main model for architect mode.
    #[serde(default)]
    pub architect_model: Option<String>,
    /// Correlation id echoed by `prompt-finished`.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Run without the existing conversation.
    #[serde(default)]
    pub clear_context: bool,
    /// Run without the tracked files.
    #[serde(default)]
    pub clear_files: bool,
}

/// One search/replace edit from `apply-edits`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EditRequest {
    /// Target path relative to the project root.
    pub path: String,
    /// Text to find.
    pub original: String,
    /// Replacement text.
    pub updated: String,
}

/// Parsed inbound action.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    /// Run a prompt.
    Prompt(PromptRequest),
    /// Answer the outstanding confirmation.
    AnswerQuestion {
        /// Raw answer (`y`, `n`, `a`, `s`).
        answer: String,
    },
    /// Attach a file.
    AddFile {
        /// Path relative to the project root, or absolute.
        path: String,
        /// Attach read-only.
        read_only: bool,
        /// Skip derived recomputation.
        no_update: bool,
    },
    /// Detach a file.
    DropFile {
        /// Tracked path.
        path: String,
        /// Skip derived recomputation.
        no_update: bool,
    },
    /// Replace the main model.
    SetModels {
        /// Main model name.
        main_model: String,
        /// Weak model name.
        weak_model: Option<String>,
        /// Edit format override.
        edit_format: Option<String>,
    },
    /// Run a slash command.
    RunCommand {
        /// Command line.
        command: String,
    },
    /// Append a settled conversation turn.
    AddMessage {
        /// Turn text.
        content: String,
        /// Turn author.
        role: Role,
        /// Append an `Ok.` acknowledgement after user turns.
        acknowledge: bool,
    },
    /// Stop the running exchange.
    InterruptResponse,
    /// Apply search/replace edits.
    ApplyEdits {
        /// Edits in order.
        edits: Vec<EditRequest>,
    },
    /// Set process environment variables.
    UpdateEnvVars {
        /// Values; `None` entries are skipped.
        environment_variables: BTreeMap<String, Option<String>>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFilePayload {
    #[serde(default)]
    path: String,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    no_update: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DropFilePayload {
    #[serde(default)]
    path: String,
    #[serde(default)]
    no_update: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetModelsPayload {
    #[serde(default)]
    main_model: String,
    weak_model: Option<String>,
    edit_format: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMessagePayload {
    #[serde(default)]
    content: String,
    role: Option<Role>,
    acknowledge: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvVarsPayload {
    #[serde(default)]
    environment_variables: BTreeMap<String, Value>,
}

impl InboundAction {
    /// Wire name of the action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prompt(_) => "prompt",
            Self::AnswerQuestion { .. } => "answer-question",
            Self::AddFile { .. } => "add-file",
            Self::DropFile { .. } => "drop-file",
            Self::SetModels { .. } => "set-models",
            Self::RunCommand { .. } => "run-command",
            Self::AddMessage { .. } => "add-message",
            Self::InterruptResponse => "interrupt-response",
            Self::ApplyEdits { .. } => "apply-edits",
            Self::UpdateEnvVars { .. } => "update-env-vars",
        }
    }

    /// Parse the `data` object of an inbound `message` frame.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`]`("No action specified")` when `action` is absent.
    /// - [`AppError::Protocol`]`("Unknown action: …")` for unknown actions.
    /// - [`AppError::InvalidInput`] when a required field is missing or empty.
    pub fn parse(data: Value) -> Result<Self> {
        let action = data
            .get("action")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| AppError::Protocol("No action specified".into()))?;

        match action.as_str() {
            "prompt" => Ok(Self::Prompt(payload(&action, data)?)),
            "answer-question" => {
                let answer = data
                    .get("answer")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| missing(&action, "answer"))?;
                Ok(Self::AnswerQuestion { answer })
            }
            "add-file" => {
                let p: AddFilePayload = payload(&action, data)?;
                require(&action, "path", &p.path)?;
                Ok(Self::AddFile {
                    path: p.path,
                    read_only: p.read_only,
                    no_update: p.no_update,
                })
            }
            "drop-file" => {
                let p: DropFilePayload = payload(&action, data)?;
                require(&action, "path", &p.path)?;
                Ok(Self::DropFile {
                    path: p.path,
                    no_update: p.no_update,
                })
            }
            "set-models" => {
                let p: SetModelsPayload = payload(&action, data)?;
                require(&action, "mainModel", &p.main_model)?;
                Ok(Self::SetModels {
                    main_model: p.main_model,
                    weak_model: p.weak_model.filter(|w| !w.is_empty()),
                    edit_format: p.edit_format.filter(|f| !f.is_empty()),
                })
            }
            "run-command" => {
                let command = data
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                require(&action, "command", &command)?;
                Ok(Self::RunCommand { command })
            }
            "add-message" => {
                let p: AddMessagePayload = payload(&action, data)?;
                require(&action, "content", &p.content)?;
                Ok(Self::AddMessage {
                    content: p.content,
                    role: p.role.unwrap_or(Role::User),
                    acknowledge: p.acknowledge.unwrap_or(true),
                })
            }
            "interrupt-response" => Ok(Self::InterruptResponse),
            "apply-edits" => {
                let edits: Vec<EditRequest> = match data.get("edits") {
                    Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone())
                        .map_err(|e| AppError::InvalidInput(format!("invalid apply-edits: {e}")))?,
                    _ => Vec::new(),
                };
                if edits.is_empty() {
                    return Err(missing(&action, "edits"));
                }
                Ok(Self::ApplyEdits { edits })
            }
            "update-env-vars" => {
                let p: EnvVarsPayload = payload(&action, data)?;
                let environment_variables = p
                    .environment_variables
                    .into_iter()
                    .map(|(key, value)| (key, env_value(value)))
                    .collect();
                Ok(Self::UpdateEnvVars {
                    environment_variables,
                })
            }
            other => Err(AppError::Protocol(format!("Unknown action: {other}"))),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(action: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| AppError::InvalidInput(format!("invalid {action} message: {e}")))
}

fn require(action: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(missing(action, field))
    } else {
        Ok(())
    }
}

fn missing(action: &str, field: &str) -> AppError {
    AppError::InvalidInput(format!("missing required field `{field}` for {action}"))
}

fn env_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
