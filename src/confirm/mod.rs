//! Confirmation round trips between the engine and the controller.
//!
//! The engine asks a yes/no/always/never question; the broker publishes it
//! and suspends the caller until the controller's answer arrives.

pub mod broker;
pub mod group;

pub use broker::ConfirmationBroker;
pub use group::ConfirmGroup;

/// Controller answer to a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Affirmative, this time only.
    Yes,
    /// Negative, this time only.
    No,
    /// Affirmative, remembered for the question's group.
    Always,
    /// Negative, remembered for the question's group.
    Never,
}

impl Answer {
    /// Parse a wire answer. Unrecognized text counts as [`Answer::No`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "a" | "always" => Self::Always,
            "s" | "never" | "d" | "don't ask" => Self::Never,
            _ => Self::No,
        }
    }

    /// Whether the engine should proceed.
    #[must_use]
    pub fn is_affirmative(self) -> bool {
        matches!(self, Self::Yes | Self::Always)
    }
}

/// Question waiting for an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    /// Question text.
    pub question: String,
    /// What the question is about (command line, file name).
    pub subject: Option<String>,
    /// Suggested answer (`y` or `n`).
    pub default_answer: String,
    /// Whether the answer may be remembered for a group.
    pub group_scope: bool,
}
