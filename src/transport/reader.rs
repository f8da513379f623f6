//! Controller reader task.
//!
//! Reads NDJSON frames, parses each `message` frame into an
//! [`InboundAction`], and routes it. Answers and interrupts are applied
//! immediately because they must land while an exchange is suspended; every
//! other action is queued for the coordination loop.
//!
//! | Action               | Route                                   |
//! |----------------------|-----------------------------------------|
//! | `answer-question`    | [`ConfirmationBroker::answer`]          |
//! | `interrupt-response` | shared interrupt flag                   |
//! | *(other known)*      | coordination queue                      |
//! | *(unknown)*          | error ack                               |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::confirm::ConfirmationBroker;
use crate::protocol::{EventKind, Frame, InboundAction, LogLevel, Outbound};
use crate::transport::codec::FrameCodec;
use crate::AppError;

/// Action waiting for the coordination loop.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    /// Frame id to acknowledge.
    pub id: Option<String>,
    /// Parsed action.
    pub action: InboundAction,
}

/// Routes parsed frames to their handlers.
#[derive(Debug, Clone)]
pub struct InboundRouter {
    broker: Arc<ConfirmationBroker>,
    interrupt: Arc<AtomicBool>,
    queue: mpsc::UnboundedSender<QueuedAction>,
    outbound: Outbound,
}

impl InboundRouter {
    /// Create a router over the shared broker, interrupt flag and queue.
    #[must_use]
    pub fn new(
        broker: Arc<ConfirmationBroker>,
        interrupt: Arc<AtomicBool>,
        queue: mpsc::UnboundedSender<QueuedAction>,
        outbound: Outbound,
    ) -> Self {
        Self {
            broker,
            interrupt,
            queue,
            outbound,
        }
    }

    /// Route one decoded line.
    ///
    /// Returns `false` once the coordination queue has closed.
    pub fn route_line(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }

        let frame: Frame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "reader: malformed frame, skipping");
                return true;
            }
        };

        if frame.event != EventKind::Message {
            debug!(event = ?frame.event, "reader: ignoring non-message frame");
            return true;
        }

        match InboundAction::parse(frame.data) {
            Ok(action) => self.route(frame.id, action),
            Err(AppError::InvalidInput(msg)) => {
                self.outbound.log(LogLevel::Error, msg.clone(), false);
                self.outbound.ack(frame.id, Err(msg));
                true
            }
            Err(err) => {
                let msg = match err {
                    AppError::Protocol(msg) => msg,
                    other => other.to_string(),
                };
                warn!(error = %msg, "reader: rejected action");
                self.outbound.ack(frame.id, Err(msg));
                true
            }
        }
    }

    /// Route a parsed action.
    ///
    /// Returns `false` once the coordination queue has closed.
    pub fn route(&self, id: Option<String>, action: InboundAction) -> bool {
        match action {
            InboundAction::AnswerQuestion { answer } => {
                if !self.broker.answer(&answer) {
                    debug!(answer, "reader: answer with no outstanding question");
                }
                self.outbound.ack(id, Ok(()));
                true
            }
            InboundAction::InterruptResponse => {
                info!("interrupting response");
                self.interrupt.store(true, Ordering::SeqCst);
                self.outbound.ack(id, Ok(()));
                true
            }
            action => self.queue.send(QueuedAction { id, action }).is_ok(),
        }
    }

    /// Handle the controller going away.
    ///
    /// Releases any suspended confirmation and stops the running exchange.
    pub fn disconnect(&self) {
        self.broker.close();
        self.interrupt.store(true, Ordering::SeqCst);
    }
}

/// Reader task: decodes frames from `stream` until EOF or cancellation.
///
/// On EOF or a fatal I/O error the router is disconnected and `shutdown` is
/// cancelled so the coordination loop ends. Malformed frames are logged and
/// skipped.
pub async fn run_reader<R>(stream: R, router: InboundRouter, shutdown: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stream, FrameCodec::new());

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        info!("reader: controller disconnected");
                        router.disconnect();
                        shutdown.cancel();
                        break;
                    }

                    Some(Err(AppError::Protocol(ref msg))) => {
                        warn!(error = msg.as_str(), "reader: framing error, skipping");
                    }

                    Some(Err(err)) => {
                        warn!(error = %err, "reader: IO error, stopping");
                        router.disconnect();
                        shutdown.cancel();
                        break;
                    }

                    Some(Ok(line)) => {
                        if !router.route_line(&line) {
                            debug!("reader: coordination queue closed, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}
