//! Global configuration parsing, layering, and validation.
//!
//! Values are resolved in precedence order: CLI flags, then the
//! `CONNECTOR_SERVER_URL` / `BASE_DIR` environment variables, then the
//! optional TOML file, then built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::registry::ModelSettings;
use crate::transport::Endpoint;
use crate::{AppError, Result};

/// Environment variable overriding [`GlobalConfig::server_url`].
pub const SERVER_URL_ENV: &str = "CONNECTOR_SERVER_URL";

/// Environment variable overriding [`GlobalConfig::base_dir`].
pub const BASE_DIR_ENV: &str = "BASE_DIR";

fn default_server_url() -> String {
    "http://localhost:24337".into()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_reflections() -> usize {
    3
}

fn default_tokenize_workers() -> usize {
    2
}

fn default_main_model() -> String {
    "gpt-4o".into()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_true() -> bool {
    true
}

fn default_map_tokens() -> usize {
    1024
}

fn default_request_timeout() -> u64 {
    600
}

fn default_ignored_warnings() -> Vec<String> {
    vec![
        "Warning: it's best to only add files that need changes to the chat.".into(),
        "https://aider.chat/docs/troubleshooting/edit-errors.html".into(),
    ]
}

fn default_ignored_error_suffixes() -> Vec<String> {
    vec![
        "is already in the chat as a read-only file".into(),
        "is already in the chat as an editable file".into(),
    ]
}

/// Startup model selection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct ModelConfig {
    /// Main model name.
    pub main: String,
    /// Weak model name; defaults to the main model's configured weak model.
    pub weak: Option<String>,
    /// Edit format override for the primary session.
    pub edit_format: Option<String>,
    /// Initial reasoning effort (`high`, `medium`, `low`).
    pub reasoning_effort: Option<String>,
    /// Initial thinking token budget (e.g. `8k`, `1024`).
    pub thinking_tokens: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            main: default_main_model(),
            weak: None,
            edit_format: None,
            reasoning_effort: None,
            thinking_tokens: None,
        }
    }
}

/// Settings for the built-in coding engine.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct EngineConfig {
    /// Base URL of the OpenAI-compatible chat-completions API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Commit edits made by the model automatically.
    pub auto_commits: bool,
    /// Lint edited files after each reply.
    pub auto_lint: bool,
    /// Lint command; edited file paths are appended as arguments.
    pub lint_cmd: Option<String>,
    /// Default command for `/test`.
    pub test_cmd: Option<String>,
    /// Run `test_cmd` after edits and offer to fix failures.
    pub auto_test: bool,
    /// Offer to run shell commands suggested by the model.
    pub suggest_shell_commands: bool,
    /// Character budget for the repo map, expressed in tokens; 0 disables it.
    pub map_tokens: usize,
    /// HTTP request timeout for model calls.
    pub request_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            auto_commits: default_true(),
            auto_lint: false,
            lint_cmd: None,
            test_cmd: None,
            auto_test: false,
            suggest_shell_commands: default_true(),
            map_tokens: default_map_tokens(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Filters applied to engine warnings and errors before they reach the controller.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct IoConfig {
    /// Warnings matched exactly are never forwarded.
    pub ignored_warnings: Vec<String>,
    /// Errors ending with any of these suffixes are never forwarded.
    pub ignored_error_suffixes: Vec<String>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            ignored_warnings: default_ignored_warnings(),
            ignored_error_suffixes: default_ignored_error_suffixes(),
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Controller endpoint (`tcp://`, `http://` or `local:`).
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Project root every tracked path must resolve under.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Maximum reflection iterations per prompt.
    #[serde(default = "default_max_reflections")]
    pub max_reflections: usize,
    /// Worker count for the autocompletion tokenizer pool.
    #[serde(default = "default_tokenize_workers")]
    pub tokenize_workers: usize,
    /// Input history file announced to the controller on init.
    #[serde(default)]
    pub input_history_file: Option<PathBuf>,
    /// Startup model selection.
    #[serde(default)]
    pub model: ModelConfig,
    /// Built-in engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Warning/error filters.
    #[serde(default)]
    pub io: IoConfig,
    /// Extra model settings merged into the registry at startup.
    #[serde(default)]
    pub models: Vec<ModelSettings>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            base_dir: default_base_dir(),
            max_reflections: default_max_reflections(),
            tokenize_workers: default_tokenize_workers(),
            input_history_file: None,
            model: ModelConfig::default(),
            engine: EngineConfig::default(),
            io: IoConfig::default(),
            models: Vec::new(),
        }
    }
}

/// Values supplied on the command line; each one wins over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--server-url`.
    pub server_url: Option<String>,
    /// `--base-dir`.
    pub base_dir: Option<PathBuf>,
    /// `--reasoning-effort`.
    pub reasoning_effort: Option<String>,
    /// `--thinking-tokens`.
    pub thinking_tokens: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read_unvalidated(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration from every layer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file is unreadable or the merged
    /// result fails validation.
    pub fn resolve(path: Option<&Path>, overrides: CliOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_unvalidated(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.apply_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply `CONNECTOR_SERVER_URL` and `BASE_DIR` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(SERVER_URL_ENV) {
            self.server_url = url;
        }
        if let Some(dir) = non_empty_env(BASE_DIR_ENV) {
            self.base_dir = PathBuf::from(dir);
        }
    }

    /// Apply command-line values on top of the current configuration.
    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(url) = overrides.server_url {
            self.server_url = url;
        }
        if let Some(dir) = overrides.base_dir {
            self.base_dir = dir;
        }
        if overrides.reasoning_effort.is_some() {
            self.model.reasoning_effort = overrides.reasoning_effort;
        }
        if overrides.thinking_tokens.is_some() {
            self.model.thinking_tokens = overrides.thinking_tokens;
        }
    }

    /// Project-local directory used for `/paste` temporary files.
    #[must_use]
    pub fn paste_temp_dir(&self) -> PathBuf {
        self.base_dir.join(".pair-bridge").join("tmp")
    }

    /// Check invariants and canonicalize `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on the first violated invariant.
    pub fn validate(&mut self) -> Result<()> {
        if self.tokenize_workers == 0 {
            return Err(AppError::Config(
                "tokenize_workers must be greater than zero".into(),
            ));
        }

        if self.model.main.trim().is_empty() {
            return Err(AppError::Config("model.main must not be empty".into()));
        }

        Endpoint::parse(&self.server_url)
            .map_err(|err| AppError::Config(format!("server_url invalid: {err}")))?;

        let canonical_root = self
            .base_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("base_dir invalid: {err}")))?;
        self.base_dir = canonical_root;

        Ok(())
    }

    fn read_unvalidated(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Ok(toml::from_str(&raw)?)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
