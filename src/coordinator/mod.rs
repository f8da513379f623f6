//! Coordination core.
//!
//! The [`Coordinator`] owns the primary [`Session`] and processes queued
//! inbound actions one at a time on the event loop. Prompts stream through
//! the [`Streamer`]; slash commands go through the
//! [`CommandDispatcher`](crate::commands::CommandDispatcher); file-set
//! changes are rebroadcast by the [`ContextTracker`].
//!
//! Answers and interrupts never reach this loop: the reader task applies
//! them directly so they land while an exchange is suspended.

pub mod handoff;
pub mod stream;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::commands::CommandDispatcher;
use crate::config::GlobalConfig;
use crate::context::{attach_path, detach_path, ContextTracker, ModelOverrides, Recompute};
use crate::engine::{EditBlock, Engine};
use crate::io::ConnectorIo;
use crate::models::session::ACKNOWLEDGEMENT;
use crate::models::{ChatMessage, EditMode, ModelDescriptor, ModelRegistry, Role, Session};
use crate::protocol::{InboundAction, LogLevel, OutboundMessage, PromptRequest, KNOWN_ACTIONS};
use crate::transport::reader::QueuedAction;
use crate::{AppError, Result};

pub use handoff::EDITOR_DONE;
pub use stream::{Exchange, Streamer};

/// Artifacts invalidated by an attach or detach.
const FILE_SET_CHANGED: Recompute = Recompute {
    context_files: true,
    tokens: true,
    autocompletion: true,
    ..Recompute::NONE
};

/// Shared handles the coordinator is built from.
pub struct CoordinatorParts {
    /// Resolved configuration.
    pub config: GlobalConfig,
    /// Reply engine.
    pub engine: Arc<dyn Engine>,
    /// Engine I/O bound to the controller.
    pub io: Arc<ConnectorIo>,
    /// Model registry.
    pub models: Arc<ModelRegistry>,
    /// Interrupt flag shared with the reader task.
    pub interrupt: Arc<AtomicBool>,
}

/// Owns the primary session and serves queued actions.
pub struct Coordinator {
    config: GlobalConfig,
    engine: Arc<dyn Engine>,
    io: Arc<ConnectorIo>,
    models: Arc<ModelRegistry>,
    interrupt: Arc<AtomicBool>,
    streamer: Streamer,
    tracker: ContextTracker,
    session: Session,
    overrides: ModelOverrides,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("session", &self.session.id)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build the primary session from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configured thinking budget cannot be
    /// parsed.
    pub fn new(parts: CoordinatorParts) -> Result<Self> {
        let CoordinatorParts {
            config,
            engine,
            io,
            models,
            interrupt,
        } = parts;

        let mut model = models.resolve(&config.model.main, config.model.weak.as_deref(), None);
        let overrides = ModelOverrides {
            reasoning_effort: config
                .model
                .reasoning_effort
                .clone()
                .filter(|effort| effort != "none"),
            thinking_tokens: config.model.thinking_tokens.clone(),
        };
        if let Some(effort) = &overrides.reasoning_effort {
            model.set_reasoning_effort(effort);
        }
        if let Some(budget) = &overrides.thinking_tokens {
            model
                .set_thinking_tokens(budget)
                .map_err(|err| AppError::Config(format!("model.thinking_tokens invalid: {err}")))?;
        }

        let edit_format = config
            .model
            .edit_format
            .clone()
            .unwrap_or_else(|| model.edit_format.clone());
        let mut session = Session::new(config.base_dir.clone(), model, EditMode::Code, edit_format);
        session.map_tokens = config.engine.map_tokens;
        session.suggest_shell_commands = config.engine.suggest_shell_commands;

        let tracker = ContextTracker::new(
            Arc::clone(&engine),
            Arc::clone(&io),
            Arc::clone(&models),
            config.tokenize_workers,
        );
        let streamer = Streamer::new(Arc::clone(&engine), Arc::clone(&io), Arc::clone(&interrupt));

        info!(session = %session.id, model = %session.model.name, "primary session created");

        Ok(Self {
            config,
            engine,
            io,
            models,
            interrupt,
            streamer,
            tracker,
            session,
            overrides,
        })
    }

    /// Primary session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connector-level reasoning settings.
    #[must_use]
    pub fn overrides(&self) -> &ModelOverrides {
        &self.overrides
    }

    /// Tokenizer jobs not yet reaped.
    #[must_use]
    pub fn pending_tokenizations(&self) -> usize {
        self.tracker.pending_tokenizations()
    }

    /// Send `init` and the initial derived state.
    pub async fn announce(&mut self) {
        self.io.outbound().message(&OutboundMessage::Init {
            base_dir: self.config.base_dir.display().to_string(),
            listen_to: KNOWN_ACTIONS.iter().map(|name| (*name).to_owned()).collect(),
            input_history_file: self
                .config
                .input_history_file
                .as_ref()
                .map(|path| path.display().to_string()),
        });

        self.warn_sanity(&self.session.model);

        let everything = Recompute::CONTEXT_FILES
            | Recompute::MODELS
            | Recompute::TOKENS
            | Recompute::REPO_MAP
            | Recompute::AUTOCOMPLETION;
        self.refresh(everything).await;
    }

    /// Serve queued actions until the queue closes or `shutdown` fires, then
    /// stop the tokenizer pool.
    ///
    /// Every action is acknowledged; failures are also reported on the log
    /// channel.
    pub async fn run(
        &mut self,
        mut queue: mpsc::UnboundedReceiver<QueuedAction>,
        shutdown: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                queued = queue.recv() => queued,
            };
            let Some(QueuedAction { id, action }) = next else {
                break;
            };

            let span = info_span!("action", action = action.name());
            match self.handle(action).instrument(span).await {
                Ok(()) => self.io.outbound().ack(id, Ok(())),
                Err(err) => {
                    let message = self.report(&err);
                    self.io.outbound().ack(id, Err(message));
                }
            }
        }

        info!("coordination loop stopped");
        self.shutdown().await;
    }

    /// Handle one action.
    ///
    /// Per-action state is reset first: a pending command announcement is
    /// finished and the interrupt flag cleared.
    ///
    /// # Errors
    ///
    /// Returns the first error the action hit; the session stays usable.
    pub async fn handle(&mut self, action: InboundAction) -> Result<()> {
        self.io.reset_state();
        self.interrupt.store(false, Ordering::SeqCst);

        match action {
            InboundAction::Prompt(request) => self.prompt(request).await,
            InboundAction::AddFile {
                path,
                read_only,
                no_update,
            } => {
                attach_path(&mut self.session, &self.io, &path, read_only);
                if !no_update {
                    self.refresh(FILE_SET_CHANGED).await;
                }
                Ok(())
            }
            InboundAction::DropFile { path, no_update } => {
                detach_path(&mut self.session, &self.io, &path);
                if !no_update {
                    self.refresh(FILE_SET_CHANGED).await;
                }
                Ok(())
            }
            InboundAction::SetModels {
                main_model,
                weak_model,
                edit_format,
            } => self.set_models(&main_model, weak_model.as_deref(), edit_format).await,
            InboundAction::RunCommand { command } => {
                let mut dispatcher = CommandDispatcher::new(
                    self.engine.as_ref(),
                    &self.io,
                    &mut self.tracker,
                    &self.config,
                );
                dispatcher
                    .dispatch(&mut self.session, &mut self.overrides, &command)
                    .await
            }
            InboundAction::AddMessage {
                content,
                role,
                acknowledge,
            } => {
                self.session.done_messages.push(ChatMessage { role, content });
                if role == Role::User && acknowledge {
                    self.session
                        .done_messages
                        .push(ChatMessage::assistant(ACKNOWLEDGEMENT));
                }
                self.refresh(Recompute::TOKENS).await;
                Ok(())
            }
            InboundAction::ApplyEdits { edits } => {
                let blocks: Vec<EditBlock> = edits
                    .into_iter()
                    .map(|edit| EditBlock {
                        path: edit.path,
                        original: edit.original,
                        updated: edit.updated,
                    })
                    .collect();
                let edited = self.engine.apply_edits(&self.session, &blocks, &self.io).await?;
                debug!(files = ?edited, "applied controller edits");
                self.io.log_info(if blocks.len() > 1 {
                    "Files have been updated."
                } else {
                    "File has been updated."
                });
                self.refresh(Recompute::CONTEXT_FILES | Recompute::TOKENS).await;
                Ok(())
            }
            InboundAction::UpdateEnvVars {
                environment_variables,
            } => {
                for (key, value) in environment_variables {
                    if let Some(value) = value {
                        std::env::set_var(&key, value);
                    }
                }
                let current = &self.session.model;
                let mut refreshed = self.models.resolve(
                    &current.name,
                    Some(&current.weak_model_name),
                    current.editor.as_deref().map(|editor| editor.name.as_str()),
                );
                refreshed.extra_params = current.extra_params.clone();
                self.session.model = refreshed;
                self.refresh(Recompute::MODELS).await;
                Ok(())
            }
            InboundAction::AnswerQuestion { .. } | InboundAction::InterruptResponse => {
                debug!("control action reached the queue, ignoring");
                Ok(())
            }
        }
    }

    /// Stop background work.
    pub async fn shutdown(&mut self) {
        self.tracker.shutdown().await;
    }

    // ── Prompts ─────────────────────────────────────────

    async fn prompt(&mut self, request: PromptRequest) -> Result<()> {
        let prompt_id = request.prompt_id.clone();
        let result = self.run_prompt(request).await;
        if let Some(prompt_id) = prompt_id {
            self.io
                .outbound()
                .message(&OutboundMessage::PromptFinished { prompt_id });
        }
        result
    }

    async fn run_prompt(&mut self, request: PromptRequest) -> Result<()> {
        if request.prompt.is_empty() {
            debug!("empty prompt, nothing to do");
            return Ok(());
        }

        let mode = match request.mode.as_deref() {
            Some(raw) if !raw.is_empty() => raw.parse::<EditMode>()?,
            _ => EditMode::Code,
        };
        let derived = mode != EditMode::Code || request.clear_context || request.clear_files;

        let io = Arc::clone(&self.io);
        let armed = (mode == EditMode::Architect).then(|| io.arm_handoff());

        let reflection = if derived {
            let mut running = self.running_session(mode, &request);
            let reflection = self
                .streamer
                .exchange(&mut running, &request.prompt, 0, None)
                .await;
            self.restore_primary(running, request.clear_context);
            reflection
        } else {
            self.streamer
                .exchange(&mut self.session, &request.prompt, 0, None)
                .await
        };
        drop(armed);

        self.tracker.send_context_files(&self.session);
        self.reflect(reflection).await;

        self.refresh(Recompute::TOKENS | Recompute::REPO_MAP | Recompute::AUTOCOMPLETION)
            .await;
        Ok(())
    }

    /// Derived session a non-default prompt runs on.
    fn running_session(&self, mode: EditMode, request: &PromptRequest) -> Session {
        let primary = &self.session;
        let model = match request.architect_model.as_deref() {
            Some(architect) if mode == EditMode::Architect && !architect.is_empty() => {
                let model = self.models.resolve(
                    architect,
                    Some(&primary.model.weak_model_name),
                    Some(&primary.model.name),
                );
                self.warn_sanity(&model);
                model
            }
            _ => primary.model.clone(),
        };

        let mut running = primary.derive(mode, model, primary.edit_format.clone());
        if request.clear_context {
            running.clear_conversation();
        }
        if request.clear_files {
            running.drop_all();
        }
        debug!(session = %running.id, mode = mode.as_str(), "derived running session");
        running
    }

    /// Rebuild the primary from the session a prompt ran on, keeping the
    /// primary's mode and model.
    fn restore_primary(&mut self, running: Session, keep_conversation: bool) {
        let mut primary = running.derive(
            self.session.mode,
            self.session.model.clone(),
            self.session.edit_format.clone(),
        );
        if keep_conversation {
            primary.done_messages = std::mem::take(&mut self.session.done_messages);
            primary.cur_messages = std::mem::take(&mut self.session.cur_messages);
        }
        self.session = primary;
    }

    /// Run follow-up prompts on the primary session.
    async fn reflect(&mut self, mut next: Option<String>) {
        let limit = self.config.max_reflections;
        let mut count = 0;

        while let Some(message) = next.take() {
            if self.streamer.is_interrupted() {
                break;
            }
            if count >= limit {
                self.io
                    .tool_warning(&format!("Only {limit} reflections allowed, stopping."));
                break;
            }

            self.io.log_loading("Reflecting message...", false);
            count += 1;
            next = self
                .streamer
                .exchange(&mut self.session, &message, count, Some(&message))
                .await;
            self.tracker.send_context_files(&self.session);
        }
    }

    // ── Models ──────────────────────────────────────────

    async fn set_models(
        &mut self,
        main: &str,
        weak: Option<&str>,
        edit_format: Option<String>,
    ) -> Result<()> {
        let mut model = self.models.resolve(main, weak, None);
        self.warn_sanity(&model);

        let edit_format = edit_format.unwrap_or_else(|| model.edit_format.clone());
        if let Some(effort) = self.session.model.reasoning_effort() {
            model.set_reasoning_effort(&effort);
        }
        if let Some(budget) = self.session.model.raw_thinking_tokens() {
            model.set_thinking_tokens(&budget.to_string())?;
        }

        self.session = self.session.derive(self.session.mode, model, edit_format);
        info!(session = %self.session.id, model = %self.session.model.name, "main model replaced");

        for line in self.engine.announcements(&self.session) {
            self.io.tool_output(&line);
        }
        self.refresh(Recompute::MODELS | Recompute::TOKENS).await;
        Ok(())
    }

    fn warn_sanity(&self, model: &ModelDescriptor) {
        for warning in self.models.sanity_warnings(model) {
            self.io.tool_warning(&warning);
        }
    }

    // ── Helpers ─────────────────────────────────────────

    async fn refresh(&mut self, what: Recompute) {
        self.tracker
            .recompute(&self.session, what, &self.overrides)
            .await;
    }

    /// Report a failed action on the log channel; returns the ack text.
    fn report(&self, err: &AppError) -> String {
        match err {
            AppError::InvalidInput(message) => {
                self.io
                    .outbound()
                    .log(LogLevel::Error, message.clone(), false);
                message.clone()
            }
            other => {
                let message = other.to_string();
                self.io
                    .tool_error(&format!("Exception in connector: {message}"));
                message
            }
        }
    }
}
