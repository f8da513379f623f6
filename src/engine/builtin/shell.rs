//! Shell commands: suggestions in replies, `/run`, lint and test runners.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::engine::{BoxFuture, CommandOutput, Linter, TestRunner};
use crate::io::ConnectorIo;
use crate::{AppError, Result};

const SHELL_FENCES: [&str; 4] = ["```bash", "```sh", "```shell", "```console"];

/// Commands from fenced `bash`/`sh` blocks in `reply`, one per line.
///
/// Comment lines and leading `$ ` prompts are dropped.
#[must_use]
pub fn suggested_commands(reply: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut inside = false;

    for line in reply.lines() {
        let trimmed = line.trim();
        if inside {
            if trimmed.starts_with("```") {
                inside = false;
                continue;
            }
            let command = trimmed.strip_prefix("$ ").unwrap_or(trimmed);
            if !command.is_empty() && !command.starts_with('#') {
                commands.push(command.to_owned());
            }
        } else if SHELL_FENCES.iter().any(|fence| trimmed == *fence) {
            inside = true;
        }
    }

    commands
}

/// Run `command` through the platform shell in `root`.
///
/// # Errors
///
/// Returns `AppError::Engine` if the shell cannot be started.
pub async fn run_shell(root: &Path, command: &str) -> Result<CommandOutput> {
    let (shell, flag) = if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let output = Command::new(shell)
        .arg(flag)
        .arg(command)
        .current_dir(root)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| AppError::Engine(format!("failed to run `{command}`: {err}")))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CommandOutput {
        command: command.to_owned(),
        output: text,
        success: output.status.success(),
    })
}

/// Chat turn carrying command output.
#[must_use]
pub fn output_message(output: &CommandOutput) -> String {
    format!(
        "Output of `{}`:\n```\n{}\n```",
        output.command,
        output.output.trim_end()
    )
}

/// Lints by running a configured command with the edited files appended.
#[derive(Debug, Clone)]
pub struct ShellLinter {
    command: String,
}

impl ShellLinter {
    /// Lint with `command`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Linter for ShellLinter {
    fn lint<'a>(
        &'a self,
        _io: &'a ConnectorIo,
        root: &'a Path,
        files: &'a [String],
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let mut line = self.command.clone();
            for file in files {
                line.push(' ');
                line.push_str(&shell_quote(file));
            }
            let output = run_shell(root, &line).await?;
            Ok((!output.success).then(|| output.output.trim().to_owned()))
        })
    }
}

/// Runs test commands through the shell and echoes their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTestRunner;

impl TestRunner for ShellTestRunner {
    fn run_tests<'a>(
        &'a self,
        io: &'a ConnectorIo,
        root: &'a Path,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let output = run_shell(root, command).await?;
            for line in output.output.lines() {
                io.tool_output(line);
            }
            Ok(output)
        })
    }
}

fn shell_quote(arg: &str) -> String {
    if arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./".contains(c))
    {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
