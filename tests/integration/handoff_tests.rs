//! Architect prompts handing their proposal to an editor sub-session.

use pair_bridge::coordinator::EDITOR_DONE;
use pair_bridge::io::EDIT_FILES_QUESTION;
use pair_bridge::models::{ChatMessage, CommitInfo, EditMode};
use pair_bridge::protocol::{InboundAction, PromptRequest};

use super::test_helpers::{answer_next, drain, harness, logs, terminal_responses, Script, Step};

fn architect(prompt: &str, architect_model: Option<&str>) -> InboundAction {
    InboundAction::Prompt(PromptRequest {
        prompt: prompt.into(),
        mode: Some("architect".into()),
        architect_model: architect_model.map(str::to_owned),
        ..PromptRequest::default()
    })
}

fn proposal_script() -> Script {
    Script::chunks(&["Change ", "alpha to beta."])
        .starting_with(Step::Ask(EDIT_FILES_QUESTION.into()))
        .costing(0.5)
}

fn editor_script() -> Script {
    let mut script = Script::chunks(&["Applied."]).costing(0.25);
    script.outcome.commit = Some(CommitInfo {
        hash: "c0ffee1".into(),
        message: "refactor: rename alpha".into(),
    });
    script.outcome.edited_files = vec!["a.txt".into()];
    script
}

#[tokio::test]
async fn accepted_proposal_runs_the_editor() {
    let mut h = harness();
    h.engine.push(proposal_script());
    h.engine.push(editor_script());

    let (result, mut frames) = tokio::join!(
        h.coordinator.handle(architect("rename alpha", None)),
        answer_next(&mut h.frames, &h.broker, "y"),
    );
    result.expect("architect prompt");
    frames.extend(drain(&mut h.frames));

    assert_eq!(
        *h.engine.answers.lock().unwrap(),
        vec![(EDIT_FILES_QUESTION.to_owned(), false)],
        "the engine is told not to edit"
    );

    let calls = h.engine.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].mode, EditMode::Architect);
    assert_eq!(calls[1].prompt, "Change alpha to beta.");
    assert_eq!(calls[1].model, "gpt-4o");
    assert_eq!(calls[1].edit_format, "editor-diff");
    assert_eq!(calls[1].mode, EditMode::Code);
    assert_eq!(calls[1].history_len, 0, "editor starts without history");

    assert!(logs(&frames, "loading").contains(&"Editing files...".to_owned()));

    let terminal = terminal_responses(&frames);
    assert_eq!(terminal.len(), 2);
    assert_eq!(terminal[0]["content"], "Change alpha to beta.");
    assert_eq!(terminal[1]["content"], "Applied.");
    assert_eq!(terminal[1]["commitHash"], "c0ffee1");
    assert_eq!(terminal[1]["diff"], "diff for c0ffee1");
    assert_eq!(terminal[1]["editedFiles"], serde_json::json!(["a.txt"]));
}

#[tokio::test]
async fn editor_results_merge_into_the_primary() {
    let mut h = harness();
    h.engine.push(proposal_script());
    h.engine.push(editor_script());

    let (result, _) = tokio::join!(
        h.coordinator.handle(architect("rename alpha", None)),
        answer_next(&mut h.frames, &h.broker, "y"),
    );
    result.expect("architect prompt");

    let session = h.coordinator.session();
    assert!((session.total_cost - 0.75).abs() < 1e-9);
    assert_eq!(
        session.last_commit.as_ref().map(|commit| commit.hash.as_str()),
        Some("c0ffee1")
    );
    assert_eq!(session.commit_hashes, vec!["c0ffee1".to_owned()]);
    assert_eq!(session.mode, EditMode::Code, "primary keeps its mode");

    let tail: Vec<&ChatMessage> = session.done_messages.iter().rev().take(2).collect();
    assert_eq!(tail[1], &ChatMessage::user(EDITOR_DONE));
    assert_eq!(tail[0], &ChatMessage::assistant("Ok."));
}

#[tokio::test]
async fn declined_proposal_skips_the_editor() {
    let mut h = harness();
    h.engine.push(proposal_script());

    let (result, _) = tokio::join!(
        h.coordinator.handle(architect("rename alpha", None)),
        answer_next(&mut h.frames, &h.broker, "n"),
    );
    result.expect("architect prompt");
    let frames = drain(&mut h.frames);

    assert_eq!(
        *h.engine.answers.lock().unwrap(),
        vec![(EDIT_FILES_QUESTION.to_owned(), false)]
    );
    assert_eq!(h.engine.calls().len(), 1);
    assert_eq!(terminal_responses(&frames).len(), 1);
    assert!(h.coordinator.session().last_commit.is_none());
}

#[tokio::test]
async fn edit_question_outside_architect_reaches_the_engine() {
    let mut h = harness();
    h.engine.push(
        Script::chunks(&["done"]).starting_with(Step::Ask(EDIT_FILES_QUESTION.into())),
    );

    let (result, _) = tokio::join!(
        h.coordinator.handle(InboundAction::Prompt(PromptRequest {
            prompt: "edit".into(),
            ..PromptRequest::default()
        })),
        answer_next(&mut h.frames, &h.broker, "y"),
    );
    result.expect("prompt");

    assert_eq!(
        *h.engine.answers.lock().unwrap(),
        vec![(EDIT_FILES_QUESTION.to_owned(), true)]
    );
    assert_eq!(h.engine.calls().len(), 1);
}

#[tokio::test]
async fn architect_model_runs_the_proposal_phase() {
    let mut h = harness();
    h.engine.push(proposal_script());
    h.engine.push(editor_script());

    let (result, _) = tokio::join!(
        h.coordinator.handle(architect("plan", Some("o3-mini"))),
        answer_next(&mut h.frames, &h.broker, "y"),
    );
    result.expect("architect prompt");

    let calls = h.engine.calls();
    assert_eq!(calls[0].model, "o3-mini");
    assert_eq!(calls[1].model, "gpt-4o", "the primary model edits");
    assert_eq!(h.coordinator.session().model.name, "gpt-4o");
}
