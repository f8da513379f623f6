//! Unit tests for `ConnectorIo` status forwarding and bridge state.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use pair_bridge::config::IoConfig;
use pair_bridge::confirm::{ConfirmGroup, ConfirmationBroker};
use pair_bridge::io::{
    is_image_file, ConnectorIo, ADD_OUTPUT_QUESTION, EDIT_FILES_QUESTION, RUN_SHELL_PREFIX,
};
use pair_bridge::protocol::{EventKind, Frame, Outbound};

fn io() -> (Arc<ConnectorIo>, Arc<ConfirmationBroker>, UnboundedReceiver<Frame>) {
    let (outbound, frames) = Outbound::channel();
    let broker = Arc::new(ConfirmationBroker::new());
    let io = Arc::new(ConnectorIo::new(
        outbound,
        Arc::clone(&broker),
        &IoConfig::default(),
    ));
    (io, broker, frames)
}

fn drain(frames: &mut UnboundedReceiver<Frame>) -> Vec<Frame> {
    let mut out = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        out.push(frame);
    }
    out
}

fn warnings(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .filter(|frame| frame.event == EventKind::Log && frame.data["level"] == "warning")
        .map(|frame| frame.data["message"].as_str().unwrap_or_default().to_owned())
        .collect()
}

/// Answer the next question on `frames` with `answer`.
async fn answer_next(frames: &mut UnboundedReceiver<Frame>, broker: &ConfirmationBroker, answer: &str) {
    loop {
        let frame = frames.recv().await.expect("frame");
        if frame.event == EventKind::Message && frame.data["action"] == "ask-question" {
            assert!(broker.answer(answer));
            return;
        }
    }
}

// ── Status lines ────────────────────────────────────────

#[test]
fn plain_output_stays_local() {
    let (io, _broker, mut frames) = io();
    io.tool_output("Repo-map: using 1024 tokens");
    assert!(drain(&mut frames).is_empty());
}

#[test]
fn commit_output_becomes_finished_info_log() {
    let (io, _broker, mut frames) = io();
    io.tool_output("Commit abc1234 feat: add parser");

    let frames = drain(&mut frames);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, EventKind::Log);
    assert_eq!(frames[0].data["level"], "info");
    assert_eq!(frames[0].data["finished"], true);
}

#[test]
fn running_command_announces_then_forwards_output() {
    let (io, _broker, mut frames) = io();

    {
        let _running = io.running_command();
        io.tool_output("Running cargo test");
        io.tool_output("test result: ok");
    }
    io.reset_state();

    let frames = drain(&mut frames);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].data["action"], "use-command-output");
    assert_eq!(frames[0].data["command"], "cargo test");
    assert_eq!(frames[0].data["finished"], false);
    assert_eq!(frames[1].event, EventKind::Log);
    assert_eq!(frames[1].data["message"], "test result: ok");
    assert_eq!(frames[2].data["action"], "use-command-output");
    assert_eq!(frames[2].data["finished"], true);
    assert!(!io.is_running_command());
}

#[test]
fn reset_without_announced_command_sends_nothing() {
    let (io, _broker, mut frames) = io();
    io.reset_state();
    assert!(drain(&mut frames).is_empty());
}

#[test]
fn ignored_warnings_and_errors_are_dropped() {
    let (io, _broker, mut frames) = io();

    io.tool_warning("Warning: it's best to only add files that need changes to the chat.");
    io.tool_error("a.rs is already in the chat as an editable file");
    assert!(drain(&mut frames).is_empty());

    io.tool_warning("careful");
    io.tool_error("boom");
    let frames = drain(&mut frames);
    assert_eq!(frames[0].data["level"], "warning");
    assert_eq!(frames[1].data["level"], "error");
}

#[test]
fn warnings_close_loading_indicator_during_phase() {
    let (io, _broker, mut frames) = io();

    {
        let _loading = io.loading_phase();
        io.tool_warning("nothing to commit");
    }
    io.tool_warning("later");

    let frames = drain(&mut frames);
    assert_eq!(frames[0].data["finished"], true);
    assert_eq!(frames[1].data["finished"], false);
}

// ── Confirmations ───────────────────────────────────────

#[tokio::test]
async fn confirm_ask_round_trips_through_broker() {
    let (io, broker, mut frames) = io();

    let (answer, ()) = tokio::join!(
        io.confirm_ask("Create new file?", "y", Some("a.rs"), None),
        answer_next(&mut frames, &broker, "y"),
    );

    assert!(answer.expect("answered"));
}

#[tokio::test]
async fn always_answer_is_remembered_for_the_group() {
    let (io, broker, mut frames) = io();
    let group = ConfirmGroup::new();

    let (first, ()) = tokio::join!(
        io.confirm_ask("Add URL to the chat?", "y", None, Some(&group)),
        answer_next(&mut frames, &broker, "a"),
    );
    assert!(first.expect("answered"));
    assert_eq!(warnings(&drain(&mut frames)), vec!["Always preference.".to_owned()]);

    let second = io
        .confirm_ask("Add URL to the chat?", "y", None, Some(&group))
        .await
        .expect("remembered");
    assert!(second);
    assert!(drain(&mut frames).is_empty());
}

#[tokio::test]
async fn never_answer_is_remembered_and_reported() {
    let (io, broker, mut frames) = io();
    let group = ConfirmGroup::new();

    let (first, ()) = tokio::join!(
        io.confirm_ask("Add URL to the chat?", "y", None, Some(&group)),
        answer_next(&mut frames, &broker, "s"),
    );
    assert!(!first.expect("answered"));
    assert_eq!(warnings(&drain(&mut frames)), vec!["Never preference.".to_owned()]);

    let second = io
        .confirm_ask("Add URL to the chat?", "y", None, Some(&group))
        .await
        .expect("remembered");
    assert!(!second);
    let frames = drain(&mut frames);
    assert_eq!(warnings(&frames), vec!["No preference.".to_owned()]);
    assert!(frames
        .iter()
        .all(|frame| frame.data["action"] != "ask-question"));
}

#[tokio::test]
async fn armed_edit_question_requests_handoff_and_returns_no() {
    let (io, broker, mut frames) = io();
    let _armed = io.arm_handoff();

    let (answer, ()) = tokio::join!(
        io.confirm_ask(EDIT_FILES_QUESTION, "y", None, None),
        answer_next(&mut frames, &broker, "y"),
    );

    assert!(!answer.expect("answered"));
    assert!(io.take_handoff_request());
    assert!(!io.take_handoff_request());
}

#[tokio::test]
async fn unarmed_edit_question_passes_through() {
    let (io, broker, mut frames) = io();

    let (answer, ()) = tokio::join!(
        io.confirm_ask(EDIT_FILES_QUESTION, "y", None, None),
        answer_next(&mut frames, &broker, "y"),
    );

    assert!(answer.expect("answered"));
    assert!(!io.take_handoff_request());
}

#[tokio::test]
async fn shell_question_marks_command_running_until_output_question() {
    let (io, broker, mut frames) = io();
    let question = format!("{RUN_SHELL_PREFIX} cargo build?");

    let (answer, ()) = tokio::join!(
        io.confirm_ask(&question, "y", Some("cargo build"), None),
        answer_next(&mut frames, &broker, "y"),
    );
    assert!(answer.expect("answered"));
    assert!(io.is_running_command());

    io.tool_output("Running cargo build");

    let (answer, ()) = tokio::join!(
        io.confirm_ask(ADD_OUTPUT_QUESTION, "n", None, None),
        answer_next(&mut frames, &broker, "n"),
    );
    assert!(!answer.expect("answered"));
    assert!(!io.is_running_command());

    let finished = drain(&mut frames)
        .into_iter()
        .any(|frame| frame.data["action"] == "use-command-output" && frame.data["finished"] == true);
    assert!(finished);
}

// ── Temporary files ─────────────────────────────────────

#[test]
fn temp_dirs_follow_redirection_and_restore() {
    let (io, _broker, _frames) = io();
    let project = tempfile::tempdir().expect("tempdir");
    let paste_root = project.path().join(".pair-bridge").join("tmp");

    assert_eq!(io.temp_root(), None);
    {
        let guard = io.redirect_temp_root(paste_root.clone());
        assert_eq!(guard.root(), Some(paste_root.clone()));

        let dir = io.create_temp_dir().expect("temp dir");
        assert!(dir.starts_with(&paste_root));
        assert!(dir.is_dir());
    }
    assert_eq!(io.temp_root(), None);
}

#[test]
fn image_extensions_are_recognized() {
    assert!(is_image_file(Path::new("shot.PNG")));
    assert!(is_image_file(Path::new("a/b/photo.jpeg")));
    assert!(!is_image_file(Path::new("main.rs")));
    assert!(!is_image_file(Path::new("Makefile")));
}
