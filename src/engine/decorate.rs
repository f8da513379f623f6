//! Status decoration around engine collaborators.
//!
//! Wrappers delegate to an inner [`Linter`] or [`TestRunner`] and emit the
//! controller events the UI expects around them.

use std::path::Path;

use crate::engine::{BoxFuture, CommandOutput, Linter, TestRunner};
use crate::io::ConnectorIo;
use crate::Result;

const LINTING: &str = "Linting...";

/// Shows a `Linting...` loading indicator while the inner linter runs.
#[derive(Debug)]
pub struct LoadingLinter<L> {
    inner: L,
}

impl<L: Linter> LoadingLinter<L> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: Linter> Linter for LoadingLinter<L> {
    fn lint<'a>(
        &'a self,
        io: &'a ConnectorIo,
        root: &'a Path,
        files: &'a [String],
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            io.log_loading(LINTING, false);
            let result = self.inner.lint(io, root, files).await;
            io.log_loading(LINTING, true);
            result
        })
    }
}

/// Marks the test command as a running external command, announces it, and
/// finishes the announcement once the command returns.
#[derive(Debug)]
pub struct CommandStatusTestRunner<T> {
    inner: T,
}

impl<T: TestRunner> CommandStatusTestRunner<T> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: TestRunner> TestRunner for CommandStatusTestRunner<T> {
    fn run_tests<'a>(
        &'a self,
        io: &'a ConnectorIo,
        root: &'a Path,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let result = {
                let _running = io.running_command();
                io.tool_output(&format!("Running {command}"));
                self.inner.run_tests(io, root, command).await
            };
            io.reset_state();
            result
        })
    }
}
