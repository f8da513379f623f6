//! Engine-facing I/O surface.
//!
//! [`ConnectorIo`] is what the engine talks to when it wants to print
//! status, warn, fail, or ask a question. It filters noise, translates
//! status lines into controller messages, and routes questions through the
//! [`ConfirmationBroker`]. A few well-known questions have side effects on
//! the bridge state; see [`ConnectorIo::confirm_ask`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::IoConfig;
use crate::confirm::{Answer, ConfirmGroup, ConfirmationBroker, PendingConfirmation};
use crate::protocol::{LogLevel, Outbound, OutboundMessage};
use crate::{AppError, Result};

/// Question the architect phase asks before applying its proposal.
pub const EDIT_FILES_QUESTION: &str = "Edit the files?";

/// Prefix of the question asked before running a suggested command.
pub const RUN_SHELL_PREFIX: &str = "Run shell command";

/// Question asked after a command ran.
pub const ADD_OUTPUT_QUESTION: &str = "Add command output to the chat?";

#[derive(Debug, Default)]
struct IoState {
    running_shell_command: bool,
    current_command: Option<String>,
    processing_loading_message: bool,
    handoff_armed: bool,
    handoff_requested: bool,
    temp_root: Option<PathBuf>,
}

/// Engine I/O bound to the controller connection.
#[derive(Debug)]
pub struct ConnectorIo {
    outbound: Outbound,
    broker: Arc<ConfirmationBroker>,
    ignored_warnings: Vec<String>,
    ignored_error_suffixes: Vec<String>,
    state: Mutex<IoState>,
}

impl ConnectorIo {
    /// Create the I/O surface.
    #[must_use]
    pub fn new(outbound: Outbound, broker: Arc<ConfirmationBroker>, filters: &IoConfig) -> Self {
        Self {
            outbound,
            broker,
            ignored_warnings: filters.ignored_warnings.clone(),
            ignored_error_suffixes: filters.ignored_error_suffixes.clone(),
            state: Mutex::new(IoState::default()),
        }
    }

    /// Outbound handle.
    #[must_use]
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    // ── Status lines ────────────────────────────────────

    /// Plain status output from the engine.
    ///
    /// While an external command runs, the first `Running <cmd>` line
    /// announces the command via `use-command-output` and later lines are
    /// forwarded as info logs. Outside a command, `Commit …` lines become
    /// finished info logs; everything else stays local.
    pub fn tool_output(&self, message: &str) {
        debug!(message, "engine output");

        let announce = {
            let mut state = self.state();
            if state.running_shell_command {
                match message.strip_prefix("Running ") {
                    Some(command) if state.current_command.is_none() => {
                        state.current_command = Some(command.to_owned());
                        Some(Some(command.to_owned()))
                    }
                    _ => Some(None),
                }
            } else {
                None
            }
        };

        match announce {
            Some(Some(command)) => self.outbound.message(&OutboundMessage::UseCommandOutput {
                command,
                finished: false,
            }),
            Some(None) => self.outbound.log(LogLevel::Info, message, false),
            None if message.starts_with("Commit ") => {
                self.outbound.log(LogLevel::Info, message, true);
            }
            None => {}
        }
    }

    /// Warning from the engine, dropped when on the ignore list.
    ///
    /// Warnings raised while a loading indicator is active close it.
    pub fn tool_warning(&self, message: &str) {
        if self.is_warning_ignored(message) {
            debug!(message, "ignored engine warning");
            return;
        }
        let finished = self.state().processing_loading_message;
        self.outbound.log(LogLevel::Warning, message, finished);
    }

    /// Error from the engine, dropped when on the ignore list.
    pub fn tool_error(&self, message: &str) {
        if self.is_error_ignored(message) {
            debug!(message, "ignored engine error");
            return;
        }
        self.outbound.log(LogLevel::Error, message, false);
    }

    /// Info line sent straight to the controller.
    pub fn log_info(&self, message: &str) {
        self.outbound.log(LogLevel::Info, message, false);
    }

    /// Loading indicator; `finished` closes it.
    pub fn log_loading(&self, message: &str, finished: bool) {
        self.outbound.log(LogLevel::Loading, message, finished);
    }

    /// Whether `message` matches an ignored warning.
    #[must_use]
    pub fn is_warning_ignored(&self, message: &str) -> bool {
        self.ignored_warnings.iter().any(|ignored| ignored == message)
    }

    /// Whether `message` ends with an ignored error suffix.
    #[must_use]
    pub fn is_error_ignored(&self, message: &str) -> bool {
        self.ignored_error_suffixes
            .iter()
            .any(|suffix| message.ends_with(suffix.as_str()))
    }

    // ── Confirmations ───────────────────────────────────

    /// Ask the controller a question on behalf of the engine.
    ///
    /// A remembered group preference answers without a round trip. Either
    /// way, once the answer is known:
    ///
    /// - yes to [`EDIT_FILES_QUESTION`] while a hand-off is armed records the
    ///   hand-off request and returns `false`, so the engine skips its own
    ///   edit application;
    /// - yes to a [`RUN_SHELL_PREFIX`] question marks an external command as
    ///   running;
    /// - [`ADD_OUTPUT_QUESTION`] finishes the running command.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Disconnected`] when the controller goes away and
    /// [`AppError::Protocol`] if a question is already outstanding.
    pub async fn confirm_ask(
        &self,
        question: &str,
        default_answer: &str,
        subject: Option<&str>,
        group: Option<&ConfirmGroup>,
    ) -> Result<bool> {
        let (answer, affirmative) = match group.and_then(ConfirmGroup::preference) {
            Some(remembered) => {
                debug!(question, remembered, "answered from group preference");
                if !remembered {
                    self.tool_warning("No preference.");
                }
                (None, remembered)
            }
            None => {
                let pending = PendingConfirmation {
                    question: question.to_owned(),
                    subject: subject.map(str::to_owned),
                    default_answer: default_answer.to_owned(),
                    group_scope: group.is_some(),
                };
                let answer = self.broker.ask(pending, &self.outbound).await?;
                (Some(answer), answer.is_affirmative())
            }
        };

        if affirmative && question == EDIT_FILES_QUESTION {
            let armed = {
                let mut state = self.state();
                if state.handoff_armed {
                    state.handoff_requested = true;
                }
                state.handoff_armed
            };
            if armed {
                self.log_loading("Editing files...", false);
                return Ok(false);
            }
        }

        if affirmative && question.starts_with(RUN_SHELL_PREFIX) {
            let mut state = self.state();
            state.running_shell_command = true;
            state.current_command = None;
        }

        if question == ADD_OUTPUT_QUESTION {
            self.reset_state();
        }

        if let (Some(group), Some(answer)) = (group, answer) {
            group.record(answer);
            match answer {
                Answer::Always => self.tool_warning("Always preference."),
                Answer::Never => self.tool_warning("Never preference."),
                Answer::Yes | Answer::No => {}
            }
        }

        Ok(affirmative)
    }

    // ── Bridge state ────────────────────────────────────

    /// Finish any announced command and clear the running state.
    pub fn reset_state(&self) {
        let finished = {
            let mut state = self.state();
            let command = state.current_command.take();
            if command.is_some() {
                state.running_shell_command = false;
            }
            command
        };

        if let Some(command) = finished {
            self.outbound.message(&OutboundMessage::UseCommandOutput {
                command,
                finished: true,
            });
        }
    }

    /// Mark an external command as running until the guard drops.
    #[must_use]
    pub fn running_command(&self) -> RunningCommand<'_> {
        self.state().running_shell_command = true;
        RunningCommand { io: self }
    }

    /// Whether an external command is marked as running.
    #[must_use]
    pub fn is_running_command(&self) -> bool {
        self.state().running_shell_command
    }

    /// Flag warnings as closing the active loading indicator until the guard drops.
    #[must_use]
    pub fn loading_phase(&self) -> LoadingPhase<'_> {
        self.state().processing_loading_message = true;
        LoadingPhase { io: self }
    }

    /// Allow [`EDIT_FILES_QUESTION`] to trigger the editor hand-off until the
    /// guard drops.
    #[must_use]
    pub fn arm_handoff(&self) -> HandoffArm<'_> {
        let mut state = self.state();
        state.handoff_armed = true;
        state.handoff_requested = false;
        drop(state);
        HandoffArm { io: self }
    }

    /// Take a recorded hand-off request.
    pub fn take_handoff_request(&self) -> bool {
        std::mem::take(&mut self.state().handoff_requested)
    }

    // ── Temporary files ─────────────────────────────────

    /// Create temporary directories under `root` until the guard drops.
    #[must_use]
    pub fn redirect_temp_root(&self, root: PathBuf) -> TempRootGuard<'_> {
        let previous = self.state().temp_root.replace(root);
        TempRootGuard { io: self, previous }
    }

    /// Current temporary-directory root, if redirected.
    #[must_use]
    pub fn temp_root(&self) -> Option<PathBuf> {
        self.state().temp_root.clone()
    }

    /// Create a persistent temporary directory under the current root.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn create_temp_dir(&self) -> Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pair-bridge-");

        let dir = match self.temp_root() {
            Some(root) => {
                std::fs::create_dir_all(&root).map_err(|err| {
                    AppError::Io(format!("failed to create {}: {err}", root.display()))
                })?;
                builder.tempdir_in(&root)
            }
            None => builder.tempdir(),
        }
        .map_err(|err| AppError::Io(format!("failed to create temporary directory: {err}")))?;

        Ok(dir.keep())
    }

    fn state(&self) -> MutexGuard<'_, IoState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("io state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Clears the running-command mark on drop.
#[derive(Debug)]
pub struct RunningCommand<'a> {
    io: &'a ConnectorIo,
}

impl Drop for RunningCommand<'_> {
    fn drop(&mut self) {
        self.io.state().running_shell_command = false;
    }
}

/// Ends the loading phase on drop.
#[derive(Debug)]
pub struct LoadingPhase<'a> {
    io: &'a ConnectorIo,
}

impl Drop for LoadingPhase<'_> {
    fn drop(&mut self) {
        self.io.state().processing_loading_message = false;
    }
}

/// Disarms the editor hand-off on drop.
#[derive(Debug)]
pub struct HandoffArm<'a> {
    io: &'a ConnectorIo,
}

impl Drop for HandoffArm<'_> {
    fn drop(&mut self) {
        let mut state = self.io.state();
        state.handoff_armed = false;
        state.handoff_requested = false;
    }
}

/// Restores the previous temporary-directory root on drop.
#[derive(Debug)]
pub struct TempRootGuard<'a> {
    io: &'a ConnectorIo,
    previous: Option<PathBuf>,
}

impl TempRootGuard<'_> {
    /// Root in effect while the guard lives.
    #[must_use]
    pub fn root(&self) -> Option<PathBuf> {
        self.io.temp_root()
    }
}

impl Drop for TempRootGuard<'_> {
    fn drop(&mut self) {
        self.io.state().temp_root = self.previous.take();
    }
}

/// Whether `path` looks like an image by extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp"))
}
