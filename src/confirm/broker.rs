//! Single-slot confirmation broker.
//!
//! At most one confirmation may be outstanding. [`ConfirmationBroker::ask`]
//! publishes an `ask-question` message and suspends on a oneshot receiver;
//! the reader task deposits the controller's answer via
//! [`ConfirmationBroker::answer`]. Closing the broker on disconnect fails
//! the suspended call instead of leaving it parked forever.

use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, info_span, Instrument};

use crate::confirm::{Answer, PendingConfirmation};
use crate::protocol::{OutboundMessage, Outbound};
use crate::{AppError, Result};

#[derive(Debug)]
enum Slot {
    Idle,
    Pending(oneshot::Sender<Answer>),
    Closed,
}

/// Pairs each outgoing question with exactly one incoming answer.
#[derive(Debug)]
pub struct ConfirmationBroker {
    slot: Mutex<Slot>,
}

impl Default for ConfirmationBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationBroker {
    /// Create an idle broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Publish `pending` and wait for the controller's answer.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`] if another confirmation is still outstanding.
    /// - [`AppError::Disconnected`] if the broker is closed before or while waiting.
    pub async fn ask(&self, pending: PendingConfirmation, outbound: &Outbound) -> Result<Answer> {
        let receiver = {
            let mut slot = self
                .slot
                .lock()
                .map_err(|_| AppError::Protocol("confirmation slot poisoned".into()))?;
            match *slot {
                Slot::Closed => {
                    return Err(AppError::Disconnected(
                        "controller is not connected".into(),
                    ))
                }
                Slot::Pending(ref tx) if !tx.is_closed() => {
                    return Err(AppError::Protocol(
                        "a confirmation is already outstanding".into(),
                    ))
                }
                Slot::Idle | Slot::Pending(_) => {
                    let (tx, rx) = oneshot::channel();
                    *slot = Slot::Pending(tx);
                    rx
                }
            }
        };

        outbound.message(&OutboundMessage::AskQuestion {
            question: pending.question.clone(),
            subject: pending.subject.clone(),
            is_group_question: pending.group_scope,
            default_answer: pending.default_answer.clone(),
        });

        let span = info_span!("confirmation", question = %pending.question);
        receiver
            .instrument(span)
            .await
            .map_err(|_| AppError::Disconnected("controller disconnected before answering".into()))
    }

    /// Deposit a raw answer into the outstanding slot.
    ///
    /// Returns `false` when no confirmation is waiting.
    pub fn answer(&self, raw: &str) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };

        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Pending(tx) => {
                let answer = Answer::parse(raw);
                debug!(?answer, "confirmation answered");
                tx.send(answer).is_ok()
            }
            Slot::Closed => {
                *slot = Slot::Closed;
                false
            }
            Slot::Idle => false,
        }
    }

    /// Whether a confirmation is waiting for an answer.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| matches!(*slot, Slot::Pending(ref tx) if !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Close the broker; the outstanding and every later ask fail.
    pub fn close(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Slot::Closed;
        }
    }
}
