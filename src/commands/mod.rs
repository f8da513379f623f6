//! Slash commands sent by the controller through `run-command`.
//!
//! The engine interprets the commands; the bridge wraps each call with the
//! status handling its class needs and afterwards rebroadcasts only what the
//! command can have changed.

pub mod dispatcher;

use crate::context::Recompute;
use crate::engine::builtin::commands::split_command;

pub use dispatcher::CommandDispatcher;

/// How the dispatcher wraps a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandClass {
    /// Shells out or prints a table; runs marked as an external command
    /// announced with this label.
    External(String),
    /// `/commit`: warnings close the loading indicator.
    Commit,
    /// `/paste`: temporary files go to the project-local temp dir.
    Paste,
    /// Everything else.
    Plain,
}

/// Classify `line`. `test_cmd` labels a bare `/test`.
#[must_use]
pub fn classify(line: &str, test_cmd: Option<&str>) -> CommandClass {
    let (name, args) = split_command(line);
    match name {
        "/run" | "/!" if !args.is_empty() => CommandClass::External(args.to_owned()),
        "/test" if !args.is_empty() => CommandClass::External(args.to_owned()),
        "/test" => test_cmd.map_or(CommandClass::Plain, |cmd| {
            CommandClass::External(cmd.to_owned())
        }),
        "/tokens" => CommandClass::External("/tokens".to_owned()),
        "/commit" => CommandClass::Commit,
        "/paste" => CommandClass::Paste,
        _ => CommandClass::Plain,
    }
}

/// Derived artifacts a finished command invalidates.
#[must_use]
pub fn recompute_after(name: &str) -> Recompute {
    match name {
        "/paste" => Recompute::CONTEXT_FILES,
        "/clear" => Recompute::TOKENS,
        "/map-refresh" => Recompute::REPO_MAP | Recompute::AUTOCOMPLETION,
        "/reasoning-effort" | "/think-tokens" => Recompute::MODELS,
        "/reset" | "/drop" | "/add" | "/read-only" => {
            Recompute::CONTEXT_FILES | Recompute::AUTOCOMPLETION | Recompute::TOKENS
        }
        _ => Recompute::NONE,
    }
}
