#![forbid(unsafe_code)]

//! `pair-bridge`: drives a coding-agent session on behalf of a remote
//! controller.
//!
//! The controller talks NDJSON over one duplex socket ([`transport`]). The
//! [`coordinator`] owns the session, streams replies from the [`engine`],
//! runs slash commands through the [`commands`] dispatcher, and keeps the
//! controller's derived views current via the [`context`] tracker.

pub mod commands;
pub mod config;
pub mod confirm;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod io;
pub mod models;
pub mod protocol;
pub mod transport;
pub mod workspace;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
