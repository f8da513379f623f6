//! Wire protocol shared with the controller.
//!
//! Every frame is a JSON envelope `{"event", "id"?, "data"}`. The `message`
//! event carries action payloads in both directions, `log` carries status
//! lines to the controller, and `ack` answers an inbound frame.

pub mod inbound;
pub mod outbound;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub use inbound::{EditRequest, InboundAction, PromptRequest, KNOWN_ACTIONS};
pub use outbound::{
    LogLevel, LogMessage, ModelsUpdate, OutboundMessage, ResponseEvent, TokenCost, TokensInfo,
};

/// Envelope event kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Action payload.
    Message,
    /// Log-channel line.
    Log,
    /// Acknowledgement of an inbound frame.
    Ack,
}

/// One NDJSON frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// Event kind.
    pub event: EventKind,
    /// Correlation id echoed by acknowledgements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Wrap an outbound action message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the message cannot be serialized.
    pub fn message(message: &OutboundMessage) -> crate::Result<Self> {
        Ok(Self {
            event: EventKind::Message,
            id: None,
            data: serde_json::to_value(message)?,
        })
    }

    /// Wrap a log-channel line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the line cannot be serialized.
    pub fn log(line: &LogMessage) -> crate::Result<Self> {
        Ok(Self {
            event: EventKind::Log,
            id: None,
            data: serde_json::to_value(line)?,
        })
    }

    /// Build an acknowledgement; `Err` carries the failure text.
    #[must_use]
    pub fn ack(id: Option<String>, outcome: std::result::Result<(), String>) -> Self {
        let data = match outcome {
            Ok(()) => json!({ "success": true }),
            Err(message) => json!({ "error": message }),
        };
        Self {
            event: EventKind::Ack,
            id,
            data,
        }
    }
}

/// Cloneable handle onto the outbound frame queue.
///
/// Sends never block; frames are written in enqueue order by the writer task.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Frame>,
}

impl Outbound {
    /// Create a handle and the receiver the writer task drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an action message.
    pub fn message(&self, message: &OutboundMessage) {
        match Frame::message(message) {
            Ok(frame) => self.push(frame),
            Err(err) => warn!(error = %err, "failed to serialize outbound message"),
        }
    }

    /// Enqueue a log-channel line, mirrored to `tracing` at the same level.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, finished: bool) {
        let line = LogMessage {
            level,
            message: message.into(),
            finished,
        };

        match level {
            LogLevel::Error => error!(message = %line.message, "controller log"),
            LogLevel::Warning => warn!(message = %line.message, "controller log"),
            LogLevel::Info => info!(message = %line.message, "controller log"),
            LogLevel::Loading => debug!(message = %line.message, finished, "controller log"),
        }

        match Frame::log(&line) {
            Ok(frame) => self.push(frame),
            Err(err) => warn!(error = %err, "failed to serialize log line"),
        }
    }

    /// Enqueue an acknowledgement.
    pub fn ack(&self, id: Option<String>, outcome: std::result::Result<(), String>) {
        self.push(Frame::ack(id, outcome));
    }

    fn push(&self, frame: Frame) {
        if self.tx.send(frame).is_err() {
            debug!("outbound queue closed, dropping frame");
        }
    }
}
