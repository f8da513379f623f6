//! Slash commands of the built-in engine.
//!
//! Status goes through [`ConnectorIo`] exactly as an interactive terminal
//! session would print it; the bridge decides what reaches the controller.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::context::{attach_path, detach_path};
use crate::engine::builtin::{git, shell, BuiltinEngine};
use crate::engine::Engine;
use crate::io::{ConnectorIo, ADD_OUTPUT_QUESTION};
use crate::models::session::ACKNOWLEDGEMENT;
use crate::models::{ChatMessage, Session};
use crate::{AppError, Result};

const CLIPBOARD_TOOLS: [&[&str]; 5] = [
    &["pbpaste"],
    &["wl-paste", "--no-newline"],
    &["xclip", "-selection", "clipboard", "-o"],
    &["xsel", "--clipboard", "--output"],
    &["powershell", "-NoProfile", "-Command", "Get-Clipboard"],
];

/// Split a command line into its name and argument text.
///
/// `/!cmd` is shorthand for `/run cmd`.
#[must_use]
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("/!") {
        return ("/!", rest.trim());
    }
    match line.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (line, ""),
    }
}

pub(super) async fn run(
    engine: &BuiltinEngine,
    session: &mut Session,
    line: &str,
    io: &ConnectorIo,
) -> Result<()> {
    let (name, args) = split_command(line);

    match name {
        "/add" => {
            for raw in args.split_whitespace() {
                attach_path(session, io, raw, false);
            }
        }
        "/read-only" => {
            for raw in args.split_whitespace() {
                attach_path(session, io, raw, true);
            }
        }
        "/drop" => {
            if args.is_empty() {
                session.drop_all();
                io.tool_output("Dropping all files from the chat session.");
            } else {
                for raw in args.split_whitespace() {
                    detach_path(session, io, raw);
                }
            }
        }
        "/clear" => {
            session.clear_conversation();
            io.tool_output("All chat history cleared.");
        }
        "/reset" => {
            session.drop_all();
            session.clear_conversation();
            io.tool_output("All files dropped and chat history cleared.");
        }
        "/run" | "/!" => run_and_offer(session, args, io, true).await?,
        "/test" => {
            let command = if args.is_empty() {
                engine.config().test_cmd.clone()
            } else {
                Some(args.to_owned())
            };
            match command {
                Some(command) => run_and_offer(session, &command, io, false).await?,
                None => io.tool_error("No test command provided."),
            }
        }
        "/commit" => commit(session, args, io).await?,
        "/paste" => paste(session, args, io).await?,
        "/tokens" => tokens(engine, session, io).await,
        "/map" => match engine.repo_map(session, &[]).await {
            Some(map) => io.tool_output(&map),
            None => io.tool_output("No repo map available."),
        },
        "/map-refresh" => engine.refresh_repo_map(),
        "/reasoning-effort" => {
            if args.is_empty() {
                let current = session.model.reasoning_effort();
                io.tool_output(&format!(
                    "Current reasoning effort: {}",
                    current.as_deref().unwrap_or("not set")
                ));
            } else {
                session.model.set_reasoning_effort(args);
                io.tool_output(&format!("Set reasoning effort to {args}"));
            }
        }
        "/think-tokens" => {
            if args.is_empty() {
                let current = session.model.thinking_tokens();
                io.tool_output(&format!(
                    "Current thinking token budget: {}",
                    current.as_deref().unwrap_or("not set")
                ));
            } else {
                session.model.set_thinking_tokens(args)?;
                let shown = session.model.thinking_tokens();
                io.tool_output(&format!(
                    "Set thinking token budget to {}",
                    shown.as_deref().unwrap_or("0")
                ));
            }
        }
        other => io.tool_error(&format!("Invalid command: {other}")),
    }

    Ok(())
}

/// Run `command`, echo its output, and offer to add it to the chat.
///
/// With `always_offer` unset the offer is only made when the command fails.
async fn run_and_offer(
    session: &mut Session,
    command: &str,
    io: &ConnectorIo,
    always_offer: bool,
) -> Result<()> {
    if command.is_empty() {
        io.tool_error("No command provided.");
        return Ok(());
    }

    let output = shell::run_shell(session.root(), command).await?;
    for line in output.output.lines() {
        io.tool_output(line);
    }

    let offer = !output.output.trim().is_empty() && (always_offer || !output.success);
    if offer && io.confirm_ask(ADD_OUTPUT_QUESTION, "y", None, None).await? {
        session
            .done_messages
            .push(ChatMessage::user(shell::output_message(&output)));
        session
            .done_messages
            .push(ChatMessage::assistant(ACKNOWLEDGEMENT));
    }
    Ok(())
}

async fn commit(session: &mut Session, args: &str, io: &ConnectorIo) -> Result<()> {
    if !git::is_repo(session.root()).await {
        io.tool_error("No git repository found.");
        return Ok(());
    }
    if !git::is_dirty(session.root()).await? {
        io.tool_warning("No more changes to commit.");
        return Ok(());
    }

    let message = if args.is_empty() {
        "pair-bridge: commit local changes"
    } else {
        args
    };
    if let Some(commit) = git::commit(session.root(), &[], message).await? {
        io.tool_output(&format!(
            "Commit {} {}",
            git::short_hash(&commit.hash),
            commit.message
        ));
        session.record_commit(commit);
    }
    Ok(())
}

async fn paste(session: &mut Session, args: &str, io: &ConnectorIo) -> Result<()> {
    let text = read_clipboard(session.root()).await?;
    if text.trim().is_empty() {
        io.tool_error("No text found in clipboard.");
        return Ok(());
    }

    let name = if args.is_empty() { "clipboard.txt" } else { args };
    if Path::new(name).components().count() != 1 {
        return Err(AppError::InvalidInput(format!("invalid paste name: {name}")));
    }

    let dir = io.create_temp_dir()?;
    let path = dir.join(name);
    tokio::fs::write(&path, text).await?;
    attach_path(session, io, &path.to_string_lossy(), true);
    Ok(())
}

async fn read_clipboard(root: &Path) -> Result<String> {
    for tool in CLIPBOARD_TOOLS {
        let Some((program, args)) = tool.split_first() else {
            continue;
        };
        let output = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .output()
            .await;
        if let Ok(output) = output {
            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
        }
    }
    Err(AppError::Engine("no clipboard tool available".into()))
}

async fn tokens(engine: &BuiltinEngine, session: &Session, io: &ConnectorIo) {
    let model = &session.model;
    let mut rows: Vec<(usize, String)> = Vec::new();

    let system = engine.system_prompt(session);
    rows.push((engine.token_count(model, &system), "system messages".into()));

    let history: usize = session
        .all_messages()
        .map(|message| engine.token_count(model, &message.content))
        .sum();
    if history > 0 {
        rows.push((history, "chat history".into()));
    }

    if let Some(map) = engine.repo_map(session, session.editable()).await {
        rows.push((engine.token_count(model, &map), "repository map".into()));
    }

    for rel in session.editable() {
        if let Ok(content) = tokio::fs::read_to_string(session.abs_path(rel)).await {
            rows.push((engine.token_count(model, &content), rel.clone()));
        }
    }
    for rel in session.read_only() {
        if let Ok(content) = tokio::fs::read_to_string(session.abs_path(rel)).await {
            rows.push((engine.token_count(model, &content), format!("{rel} (read-only)")));
        }
    }

    let total: usize = rows.iter().map(|(count, _)| count).sum();
    io.tool_output(&format!(
        "Approximate context window usage for {}, in tokens:",
        model.name
    ));
    for (count, label) in &rows {
        io.tool_output(&format!("{count:>8} {label}"));
    }
    io.tool_output(&format!("{total:>8} tokens total"));
    io.tool_output(&format!("Estimated cost: ${:.4}", model.input_cost(total)));
}
