//! Architect-to-editor hand-off.
//!
//! When the controller says yes to `Edit the files?` during an architect
//! exchange, the engine is told "no" and the bridge applies the proposal
//! itself: an editor sub-session streams a reply to the proposal, and its
//! cost and commits are merged back into the originating session.

use tracing::info;

use crate::coordinator::stream::{settle, Streamer};
use crate::models::Session;

/// Synthetic turn recorded in the originating session after the editor ran.
pub const EDITOR_DONE: &str = "I made those changes to the files.";

impl Streamer {
    /// Apply `proposal` with an editor sub-session spawned from `session`.
    ///
    /// The editor's reply is streamed like any exchange, closing with its own
    /// terminal `response`. Returns the editor's follow-up prompt, if any.
    pub async fn hand_off(&self, session: &mut Session, proposal: &str) -> Option<String> {
        let mut editor = session.spawn_editor();
        info!(
            architect = %session.id,
            editor = %editor.id,
            model = %editor.model.name,
            "handing proposal to the editor"
        );

        let exchange = self.stream(&editor, proposal, None).await;
        self.finish(&editor, &exchange, None).await;
        settle(&mut editor, proposal, &exchange);
        merge_editor(session, editor);

        if exchange.interrupted {
            None
        } else {
            exchange.outcome.reflected_message
        }
    }
}

/// Fold a finished editor sub-session back into `session`.
///
/// The editor started from the originating session's cost, so its total
/// already includes it.
pub fn merge_editor(session: &mut Session, editor: Session) {
    session.move_back_cur_messages(Some(EDITOR_DONE));
    session.total_cost = editor.total_cost;
    session.commit_hashes = editor.commit_hashes;
    session.last_commit = editor.last_commit;
}
