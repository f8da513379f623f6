//! `run-command` dispatch.
//!
//! | Command                      | Before the engine                         | After                         |
//! |------------------------------|-------------------------------------------|-------------------------------|
//! | `/map`                       | answered here, engine not called          |                               |
//! | `/reasoning-effort <v>`      | validated; `none` handled here            | models                        |
//! | `/run`, `/!`, `/test`, `/tokens` | marked as running, `Running …` announced | command output finished    |
//! | `/commit`                    | loading indicator, warnings close it      |                               |
//! | `/paste`                     | temp dirs redirected into the project     | context files                 |
//! | `/think-tokens`              |                                           | `0` strips thinking; models   |
//! | `/clear`, `/reset`, `/drop`, `/add`, `/read-only`, `/map-refresh` | | see [`recompute_after`] |

use tracing::{debug, info};

use crate::commands::{classify, recompute_after, CommandClass};
use crate::config::GlobalConfig;
use crate::context::{ContextTracker, ModelOverrides};
use crate::engine::builtin::commands::split_command;
use crate::engine::Engine;
use crate::io::ConnectorIo;
use crate::models::model::REASONING_EFFORTS;
use crate::models::Session;
use crate::protocol::LogLevel;
use crate::Result;

const INVALID_REASONING_EFFORT: &str =
    "Invalid reasoning effort value. Use '/reasoning-effort [high|medium|low|none]'.";

/// Runs one slash command against the primary session.
pub struct CommandDispatcher<'a> {
    engine: &'a dyn Engine,
    io: &'a ConnectorIo,
    tracker: &'a mut ContextTracker,
    config: &'a GlobalConfig,
}

impl<'a> CommandDispatcher<'a> {
    /// Borrow the collaborators for one dispatch.
    #[must_use]
    pub fn new(
        engine: &'a dyn Engine,
        io: &'a ConnectorIo,
        tracker: &'a mut ContextTracker,
        config: &'a GlobalConfig,
    ) -> Self {
        Self {
            engine,
            io,
            tracker,
            config,
        }
    }

    /// Dispatch `line`.
    ///
    /// User-input errors are reported on the log channel and leave the
    /// session unchanged.
    ///
    /// # Errors
    ///
    /// Propagates engine failures; the running-command mark and temp-dir
    /// redirection are restored either way.
    pub async fn dispatch(
        &mut self,
        session: &mut Session,
        overrides: &mut ModelOverrides,
        line: &str,
    ) -> Result<()> {
        let (name, args) = split_command(line);
        info!(command = name, "dispatching command");

        match name {
            "/map" => {
                let map = self.engine.repo_map(session, &[]).await;
                self.io
                    .log_info(map.as_deref().unwrap_or("No repo map available."));
                return Ok(());
            }
            "/reasoning-effort" => {
                let mut parts = args.split_whitespace();
                let value = match (parts.next(), parts.next()) {
                    (Some(value), None) if REASONING_EFFORTS.contains(&value) => value,
                    _ => {
                        self.io
                            .outbound()
                            .log(LogLevel::Error, INVALID_REASONING_EFFORT, false);
                        return Ok(());
                    }
                };
                if value == "none" {
                    session.model.clear_reasoning_effort();
                    overrides.reasoning_effort = None;
                    self.tracker.send_models(session, overrides);
                    return Ok(());
                }
                overrides.reasoning_effort = Some(value.to_owned());
            }
            _ => {}
        }

        let class = classify(line, self.config.engine.test_cmd.as_deref());
        self.run_engine(session, line, &class).await?;

        match name {
            "/map-refresh" => self.io.log_info("The repo map has been refreshed."),
            "/think-tokens" => {
                if session.model.raw_thinking_tokens() == Some(0) {
                    session.model.clear_thinking();
                    overrides.thinking_tokens = None;
                } else if !args.is_empty() {
                    overrides.thinking_tokens = session.model.thinking_tokens();
                }
            }
            _ => {}
        }

        let what = recompute_after(name);
        if !what.is_empty() {
            self.tracker.recompute(session, what, overrides).await;
        }
        Ok(())
    }

    async fn run_engine(&self, session: &mut Session, line: &str, class: &CommandClass) -> Result<()> {
        match class {
            CommandClass::External(label) => {
                let result = {
                    let _running = self.io.running_command();
                    self.io.tool_output(&format!("Running {label}"));
                    self.engine.run_command(session, line, self.io).await
                };
                self.io.reset_state();
                result
            }
            CommandClass::Commit => {
                let _loading = self.io.loading_phase();
                self.io.log_loading("Committing changes...", false);
                self.engine.run_command(session, line, self.io).await
            }
            CommandClass::Paste => {
                let temp_root = self.config.paste_temp_dir();
                debug!(dir = %temp_root.display(), "redirecting temporary files");
                let _redirect = self.io.redirect_temp_root(temp_root);
                self.engine.run_command(session, line, self.io).await
            }
            CommandClass::Plain => self.engine.run_command(session, line, self.io).await,
        }
    }
}

impl std::fmt::Debug for CommandDispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}
