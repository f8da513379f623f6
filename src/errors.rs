//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Socket connect, read, or write failure.
    Transport(String),
    /// Malformed or unexpected wire message.
    Protocol(String),
    /// Failure raised by the underlying coding engine.
    Engine(String),
    /// File system path failed validation against the project root.
    PathViolation(String),
    /// Search/replace edit could not be applied.
    Edit(String),
    /// Caller supplied an invalid argument or omitted a required field.
    InvalidInput(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Remote controller went away while a round trip was outstanding.
    Disconnected(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Engine(msg) => write!(f, "engine: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::Edit(msg) => write!(f, "edit: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Disconnected(msg) => write!(f, "disconnected: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Engine(format!("model request failed: {err}"))
    }
}
