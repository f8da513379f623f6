//! Reply streaming for one exchange.
//!
//! An exchange pulls the engine's reply stream chunk by chunk, forwards each
//! chunk as a partial `response`, and closes with exactly one terminal
//! `response`. The interrupt flag is checked once per chunk after yielding to
//! the scheduler, so an interrupt stops the stream within one chunk and
//! keeps what was already forwarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, instrument, warn};

use crate::engine::{Engine, ReplyEvent, ReplyOutcome};
use crate::io::ConnectorIo;
use crate::models::Session;
use crate::protocol::{OutboundMessage, ResponseEvent};

/// What one consumed reply stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    /// Forwarded text, or the engine's terminal content when nothing streamed.
    pub content: String,
    /// Terminal result; default when the stream ended early.
    pub outcome: ReplyOutcome,
    /// The interrupt flag was observed.
    pub interrupted: bool,
    /// The stream failed before finishing.
    pub failed: bool,
}

/// Drives reply streams against the engine.
pub struct Streamer {
    engine: Arc<dyn Engine>,
    io: Arc<ConnectorIo>,
    interrupt: Arc<AtomicBool>,
}

impl std::fmt::Debug for Streamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("interrupted", &self.is_interrupted())
            .finish_non_exhaustive()
    }
}

impl Streamer {
    /// Create a streamer sharing the interrupt flag with the reader task.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>, io: Arc<ConnectorIo>, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            engine,
            io,
            interrupt,
        }
    }

    /// Whether an interrupt has been requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Run one exchange on `session`, settle it, and run the editor hand-off
    /// when the controller accepted an architect proposal.
    ///
    /// `reflected` is the reflection prompt this exchange answers, echoed on
    /// every `response` event. Returns the follow-up prompt the engine asked
    /// for, unless the exchange was interrupted.
    #[instrument(name = "exchange", skip_all, fields(session = %session.id, reflection = reflection))]
    pub async fn exchange(
        &self,
        session: &mut Session,
        prompt: &str,
        reflection: usize,
        reflected: Option<&str>,
    ) -> Option<String> {
        let exchange = self.stream(session, prompt, reflected).await;
        self.finish(session, &exchange, reflected).await;
        settle(session, prompt, &exchange);

        if exchange.interrupted {
            debug!("exchange interrupted");
            return None;
        }
        if self.io.take_handoff_request() {
            return self.hand_off(session, &exchange.content).await;
        }
        exchange.outcome.reflected_message
    }

    /// Consume the reply stream for `prompt`, forwarding partial events.
    ///
    /// A stream error is reported on the log channel and ends the exchange.
    pub async fn stream(&self, session: &Session, prompt: &str, reflected: Option<&str>) -> Exchange {
        let mut content = String::new();
        let mut outcome = None;
        let mut failed = false;

        let mut replies = self.engine.run_stream(session, prompt, &self.io);
        while let Some(item) = replies.next().await {
            match item {
                Ok(ReplyEvent::Chunk(chunk)) => {
                    tokio::task::yield_now().await;
                    if self.is_interrupted() {
                        debug!("interrupt observed, stopping stream");
                        break;
                    }
                    content.push_str(&chunk);
                    self.io
                        .outbound()
                        .message(&OutboundMessage::Response(ResponseEvent::chunk(
                            &chunk, reflected,
                        )));
                }
                Ok(ReplyEvent::Done(done)) => {
                    outcome = Some(done);
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "reply stream failed");
                    self.io.tool_error(&err.to_string());
                    failed = true;
                    break;
                }
            }
        }
        drop(replies);

        let outcome = outcome.unwrap_or_default();
        if content.is_empty() {
            content.clone_from(&outcome.content);
        }

        Exchange {
            content,
            outcome,
            interrupted: self.is_interrupted(),
            failed,
        }
    }

    /// Emit the terminal `response` for `exchange`.
    pub async fn finish(&self, session: &Session, exchange: &Exchange, reflected: Option<&str>) {
        let outcome = &exchange.outcome;
        let mut event = ResponseEvent {
            finished: true,
            content: exchange.content.clone(),
            edited_files: Some(outcome.edited_files.clone()),
            usage_report: outcome.usage_report.clone(),
            reflected_message: reflected.map(str::to_owned),
            ..ResponseEvent::default()
        };

        if let Some(commit) = &outcome.commit {
            event.commit_hash = Some(commit.hash.clone());
            event.commit_message = Some(commit.message.clone());
            event.diff = match self.engine.commit_diff(session.root(), &commit.hash).await {
                Ok(diff) => Some(diff),
                Err(err) => {
                    warn!(error = %err, hash = %commit.hash, "failed to diff commit");
                    None
                }
            };
        }

        self.io
            .outbound()
            .message(&OutboundMessage::Response(event));
    }
}

/// Fold a finished exchange into `session`.
///
/// Interrupted replies are settled with an `(interrupted)` marker; a failed
/// stream that produced nothing leaves the conversation alone. Cost and
/// commits are recorded either way.
pub fn settle(session: &mut Session, prompt: &str, exchange: &Exchange) {
    let outcome = &exchange.outcome;

    if exchange.interrupted {
        session.settle_interrupted(prompt, &exchange.content);
    } else if !(exchange.failed && exchange.content.is_empty()) {
        session.record_exchange(prompt, &exchange.content);
        session.move_back_cur_messages(None);
    }

    session
        .done_messages
        .extend(outcome.extra_messages.iter().cloned());
    session.total_cost += outcome.cost;
    if let Some(commit) = outcome.commit.clone() {
        session.record_commit(commit);
    }
}
