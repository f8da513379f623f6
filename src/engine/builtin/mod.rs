//! Built-in coding engine backed by an OpenAI-compatible API.
//!
//! Replies stream from the chat-completions endpoint. After a reply the
//! engine applies its edit blocks, commits, lints, tests and offers
//! suggested shell commands, asking the controller through
//! [`ConnectorIo`] wherever a human decision is needed.

pub mod client;
pub mod commands;
pub mod edits;
pub mod git;
pub mod prompts;
pub mod repo_map;
pub mod shell;

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use crate::config::EngineConfig;
use crate::confirm::ConfirmGroup;
use crate::engine::builtin::client::{ChatClient, StreamDelta, Usage};
use crate::engine::builtin::repo_map::RepoMapper;
use crate::engine::{
    estimate_tokens, BoxFuture, EditBlock, Engine, Linter, ReplyEvent, ReplyOutcome, ReplyStream,
    TestRunner,
};
use crate::io::{ConnectorIo, ADD_OUTPUT_QUESTION, EDIT_FILES_QUESTION, RUN_SHELL_PREFIX};
use crate::models::model::format_token_count;
use crate::models::session::ACKNOWLEDGEMENT;
use crate::models::{ChatMessage, EditMode, Session};
use crate::workspace::resolve;
use crate::Result;

const LINT_QUESTION: &str = "Attempt to fix lint errors?";
const TEST_QUESTION: &str = "Attempt to fix test errors?";
const EDIT_RETRY_HINT: &str = "The SEARCH section must exactly match an existing block of lines including all white space, comments, indentation and docstrings.";

/// Engine talking to a chat-completions API.
pub struct BuiltinEngine {
    config: EngineConfig,
    client: ChatClient,
    mapper: RepoMapper,
    shell_group: ConfirmGroup,
    linter: Option<Box<dyn Linter>>,
    tests: Box<dyn TestRunner>,
}

impl std::fmt::Debug for BuiltinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinEngine")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl BuiltinEngine {
    /// Build the engine with its lint and test collaborators.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Engine` if the HTTP client cannot be built.
    pub fn new(
        config: &EngineConfig,
        linter: Option<Box<dyn Linter>>,
        tests: Box<dyn TestRunner>,
    ) -> Result<Self> {
        let client = ChatClient::new(
            &config.api_base,
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        Ok(Self {
            config: config.clone(),
            client,
            mapper: RepoMapper::new(),
            shell_group: ConfirmGroup::new(),
            linter,
            tests,
        })
    }

    /// Engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn build_messages(&self, session: &Session, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(prompts::system_prompt(session))];

        if let Some(map) = self.repo_map(session, session.editable()).await {
            messages.push(ChatMessage::user(map));
            messages.push(ChatMessage::assistant(ACKNOWLEDGEMENT));
        }

        if !session.read_only().is_empty() {
            let body = file_listing(session, session.read_only()).await;
            messages.push(ChatMessage::user(format!("{}{body}", prompts::READ_ONLY_PREFIX)));
            messages.push(ChatMessage::assistant(ACKNOWLEDGEMENT));
        }

        if session.editable().is_empty() {
            messages.push(ChatMessage::user(prompts::NO_FILES));
        } else {
            let body = file_listing(session, session.editable()).await;
            messages.push(ChatMessage::user(format!("{}{body}", prompts::FILES_PREFIX)));
        }
        messages.push(ChatMessage::assistant(ACKNOWLEDGEMENT));

        messages.extend(session.all_messages().cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }

    async fn finish_reply(
        &self,
        session: &Session,
        prompt: &str,
        mut outcome: ReplyOutcome,
        io: &ConnectorIo,
    ) -> Result<ReplyOutcome> {
        let apply = match session.mode {
            EditMode::Code => true,
            EditMode::Architect => {
                !outcome.content.trim().is_empty()
                    && io.confirm_ask(EDIT_FILES_QUESTION, "y", None, None).await?
            }
            EditMode::Ask | EditMode::Context => false,
        };

        if apply {
            self.apply_reply_edits(session, prompt, io, &mut outcome).await?;
        }

        if session.mode == EditMode::Code
            && session.suggest_shell_commands
            && self.config.suggest_shell_commands
        {
            self.offer_shell_commands(session, io, &mut outcome).await?;
        }

        Ok(outcome)
    }

    async fn apply_reply_edits(
        &self,
        session: &Session,
        prompt: &str,
        io: &ConnectorIo,
        outcome: &mut ReplyOutcome,
    ) -> Result<()> {
        let blocks = edits::parse_edit_blocks(&outcome.content);
        if blocks.is_empty() {
            return Ok(());
        }

        let mut failures = Vec::new();
        for block in &blocks {
            let Ok(resolved) = resolve(session.root(), &block.path) else {
                io.tool_error(&format!(
                    "Skipping edits to {}, which is not within the project",
                    block.path
                ));
                continue;
            };
            if resolved.absolute.exists() && !session.editable().contains(&resolved.relative) {
                io.tool_error(&format!(
                    "Skipping edits to {}, which is not in the chat as an editable file",
                    resolved.relative
                ));
                continue;
            }
            match edits::apply_blocks(session.root(), std::slice::from_ref(block)) {
                Ok(edited) => {
                    for path in edited {
                        if !outcome.edited_files.contains(&path) {
                            io.tool_output(&format!("Applied edit to {path}"));
                            outcome.edited_files.push(path);
                        }
                    }
                }
                Err(err) => failures.push(err.to_string()),
            }
        }

        if !failures.is_empty() {
            let report = failures.join("\n\n");
            io.tool_error(&report);
            outcome.reflected_message = Some(format!("{report}\n\n{EDIT_RETRY_HINT}"));
        }

        if outcome.edited_files.is_empty() {
            return Ok(());
        }

        if self.config.auto_commits && git::is_repo(session.root()).await {
            let message = commit_message(prompt);
            match git::commit(session.root(), &outcome.edited_files, &message).await {
                Ok(Some(commit)) => {
                    io.tool_output(&format!(
                        "Commit {} {}",
                        git::short_hash(&commit.hash),
                        commit.message
                    ));
                    outcome.commit = Some(commit);
                }
                Ok(None) => debug!("nothing to commit after edits"),
                Err(err) => io.tool_error(&err.to_string()),
            }
        }

        if outcome.reflected_message.is_none() && self.config.auto_lint {
            if let Some(linter) = &self.linter {
                match linter.lint(io, session.root(), &outcome.edited_files).await {
                    Ok(Some(errors)) => {
                        io.tool_error(&errors);
                        if io.confirm_ask(LINT_QUESTION, "y", None, None).await? {
                            outcome.reflected_message =
                                Some(format!("# Fix any errors below, if possible.\n\n{errors}"));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => io.tool_error(&err.to_string()),
                }
            }
        }

        if outcome.reflected_message.is_none() && self.config.auto_test {
            if let Some(command) = self.config.test_cmd.as_deref() {
                match self.tests.run_tests(io, session.root(), command).await {
                    Ok(output) if !output.success => {
                        if io.confirm_ask(TEST_QUESTION, "y", None, None).await? {
                            outcome.reflected_message = Some(shell::output_message(&output));
                        }
                    }
                    Ok(_) => {}
                    Err(err) => io.tool_error(&err.to_string()),
                }
            }
        }

        Ok(())
    }

    async fn offer_shell_commands(
        &self,
        session: &Session,
        io: &ConnectorIo,
        outcome: &mut ReplyOutcome,
    ) -> Result<()> {
        let question = format!("{RUN_SHELL_PREFIX}?");

        for command in shell::suggested_commands(&outcome.content) {
            let run = io
                .confirm_ask(&question, "y", Some(&command), Some(&self.shell_group))
                .await?;
            if !run {
                continue;
            }

            io.tool_output(&format!("Running {command}"));
            let output = match shell::run_shell(session.root(), &command).await {
                Ok(output) => output,
                Err(err) => {
                    io.tool_error(&err.to_string());
                    io.reset_state();
                    continue;
                }
            };
            for line in output.output.lines() {
                io.tool_output(line);
            }

            if output.output.trim().is_empty() {
                io.reset_state();
                continue;
            }
            if io.confirm_ask(ADD_OUTPUT_QUESTION, "y", None, None).await? {
                outcome
                    .extra_messages
                    .push(ChatMessage::user(shell::output_message(&output)));
                outcome
                    .extra_messages
                    .push(ChatMessage::assistant(ACKNOWLEDGEMENT));
            }
        }

        Ok(())
    }

    fn usage_report(&self, session: &Session, sent: u64, received: u64) -> (f64, String) {
        let cost = session.model.request_cost(sent, received);
        let report = format!(
            "Tokens: {} sent, {} received. Cost: ${cost:.4} message, ${:.4} session.",
            format_token_count(sent),
            format_token_count(received),
            session.total_cost + cost
        );
        (cost, report)
    }
}

impl Engine for BuiltinEngine {
    fn run_stream<'a>(
        &'a self,
        session: &'a Session,
        prompt: &'a str,
        io: &'a ConnectorIo,
    ) -> ReplyStream<'a> {
        Box::pin(async_stream::try_stream! {
            debug!(model = %session.model.name, mode = session.mode.as_str(), "starting completion");
            let messages = self.build_messages(session, prompt).await;
            let estimated_sent: usize = messages.iter().map(|m| estimate_tokens(&m.content)).sum();

            let mut reply = String::new();
            let mut usage: Option<Usage> = None;

            if session.model.use_streaming {
                let mut deltas = self.client.stream(&session.model, messages);
                while let Some(delta) = deltas.next().await {
                    match delta? {
                        StreamDelta::Content(text) => {
                            reply.push_str(&text);
                            yield ReplyEvent::Chunk(text);
                        }
                        StreamDelta::Usage(reported) => usage = Some(reported),
                        StreamDelta::Done => break,
                    }
                }
            } else {
                let completion = self.client.complete(&session.model, messages).await?;
                reply = completion.content;
                usage = completion.usage;
            }

            let usage = usage.unwrap_or(Usage {
                prompt_tokens: estimated_sent as u64,
                completion_tokens: estimate_tokens(&reply) as u64,
            });
            let (cost, report) = self.usage_report(session, usage.prompt_tokens, usage.completion_tokens);

            let outcome = ReplyOutcome {
                content: reply,
                usage_report: Some(report),
                cost,
                ..ReplyOutcome::default()
            };
            let outcome = self.finish_reply(session, prompt, outcome, io).await?;
            yield ReplyEvent::Done(outcome);
        })
    }

    fn run_command<'a>(
        &'a self,
        session: &'a mut Session,
        line: &'a str,
        io: &'a ConnectorIo,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(commands::run(self, session, line, io))
    }

    fn apply_edits<'a>(
        &'a self,
        session: &'a Session,
        edits: &'a [EditBlock],
        _io: &'a ConnectorIo,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { edits::apply_blocks(session.root(), edits) })
    }

    fn repo_map<'a>(
        &'a self,
        session: &'a Session,
        chat_files: &'a [String],
    ) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            if session.map_tokens == 0 {
                return None;
            }
            let files: Vec<String> = git::list_files(session.root())
                .await
                .into_iter()
                .filter(|file| !chat_files.contains(file))
                .collect();
            let map = self.mapper.render(session.root(), &files, session.map_tokens);
            (!map.is_empty()).then(|| format!("{}{map}", prompts::REPO_CONTENT_PREFIX))
        })
    }

    fn refresh_repo_map(&self) {
        self.mapper.refresh();
    }

    fn repo_content_prefix(&self) -> &str {
        prompts::REPO_CONTENT_PREFIX
    }

    fn system_prompt(&self, session: &Session) -> String {
        prompts::system_prompt(session)
    }

    fn all_files<'a>(&'a self, root: &'a Path) -> BoxFuture<'a, Vec<String>> {
        Box::pin(git::list_files(root))
    }

    fn commit_diff<'a>(&'a self, root: &'a Path, hash: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(git::commit_diff(root, hash))
    }

    fn announcements(&self, session: &Session) -> Vec<String> {
        let model = &session.model;
        let mut lines = vec![format!(
            "Model: {} with {} edit format",
            model.name, session.edit_format
        )];
        if let Some(editor) = model.editor.as_deref() {
            lines.push(format!(
                "Editor model: {} with {} edit format",
                editor.name, model.editor_edit_format
            ));
        }
        lines.push(format!("Weak model: {}", model.weak_model_name));
        if session.map_tokens > 0 {
            lines.push(format!("Repo-map: using {} tokens", session.map_tokens));
        } else {
            lines.push("Repo-map: disabled".into());
        }
        lines
    }
}

async fn file_listing(session: &Session, files: &[String]) -> String {
    let mut body = String::new();
    for rel in files {
        let Ok(content) = tokio::fs::read_to_string(session.abs_path(rel)).await else {
            continue;
        };
        body.push_str(&format!("{rel}\n```\n{content}"));
        if !content.ends_with('\n') {
            body.push('\n');
        }
        body.push_str("```\n\n");
    }
    body
}

fn commit_message(prompt: &str) -> String {
    let summary: String = prompt
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("apply edits")
        .trim()
        .chars()
        .take(60)
        .collect();
    format!("pair-bridge: {summary}")
}
