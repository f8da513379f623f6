//! Remembered group preferences.

use std::sync::Mutex;

use crate::confirm::Answer;

/// Category of related questions whose `always`/`never` answer sticks.
///
/// The owner keeps the group alive for as long as the preference should
/// apply; the built-in engine holds its groups for the whole process.
#[derive(Debug, Default)]
pub struct ConfirmGroup {
    preference: Mutex<Option<bool>>,
}

impl ConfirmGroup {
    /// Create a group with no preference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembered decision: `Some(true)` for always, `Some(false)` for never.
    #[must_use]
    pub fn preference(&self) -> Option<bool> {
        self.preference.lock().map(|guard| *guard).unwrap_or(None)
    }

    /// Remember `always` or `never`; other answers leave the group untouched.
    pub fn record(&self, answer: Answer) {
        let value = match answer {
            Answer::Always => true,
            Answer::Never => false,
            Answer::Yes | Answer::No => return,
        };
        if let Ok(mut guard) = self.preference.lock() {
            *guard = Some(value);
        }
    }
}
