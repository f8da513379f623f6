//! Unit tests for inbound action parsing and outbound message shapes.

use serde_json::json;

use pair_bridge::models::{ContextEntry, ModelInfo, Role};
use pair_bridge::protocol::{
    InboundAction, ModelsUpdate, OutboundMessage, PromptRequest, ResponseEvent, KNOWN_ACTIONS,
};
use pair_bridge::AppError;

// ── Inbound ─────────────────────────────────────────────

#[test]
fn missing_action_is_a_protocol_error() {
    let err = InboundAction::parse(json!({ "prompt": "hi" })).expect_err("no action");
    assert!(matches!(err, AppError::Protocol(ref msg) if msg == "No action specified"));
}

#[test]
fn unknown_action_names_the_action() {
    let err = InboundAction::parse(json!({ "action": "fly" })).expect_err("unknown");
    assert!(matches!(err, AppError::Protocol(ref msg) if msg == "Unknown action: fly"));
}

#[test]
fn prompt_parses_camel_case_fields() {
    let action = InboundAction::parse(json!({
        "action": "prompt",
        "prompt": "add tests",
        "mode": "architect",
        "architectModel": "o3-mini",
        "promptId": "p-1",
        "clearContext": true,
        "clearFiles": false,
    }))
    .expect("parses");

    assert_eq!(
        action,
        InboundAction::Prompt(PromptRequest {
            prompt: "add tests".into(),
            mode: Some("architect".into()),
            architect_model: Some("o3-mini".into()),
            prompt_id: Some("p-1".into()),
            clear_context: true,
            clear_files: false,
        })
    );
}

#[test]
fn empty_prompt_still_parses() {
    let action = InboundAction::parse(json!({ "action": "prompt" })).expect("parses");
    assert_eq!(action, InboundAction::Prompt(PromptRequest::default()));
}

#[test]
fn add_file_requires_path() {
    let err = InboundAction::parse(json!({ "action": "add-file" })).expect_err("no path");
    assert!(matches!(
        err,
        AppError::InvalidInput(ref msg) if msg == "missing required field `path` for add-file"
    ));
}

#[test]
fn add_file_reads_flags() {
    let action = InboundAction::parse(json!({
        "action": "add-file",
        "path": "src/lib.rs",
        "readOnly": true,
        "noUpdate": true,
    }))
    .expect("parses");

    assert_eq!(
        action,
        InboundAction::AddFile {
            path: "src/lib.rs".into(),
            read_only: true,
            no_update: true,
        }
    );
}

#[test]
fn set_models_drops_empty_optionals() {
    let action = InboundAction::parse(json!({
        "action": "set-models",
        "mainModel": "gpt-4.1",
        "weakModel": "",
        "editFormat": "whole",
    }))
    .expect("parses");

    assert_eq!(
        action,
        InboundAction::SetModels {
            main_model: "gpt-4.1".into(),
            weak_model: None,
            edit_format: Some("whole".into()),
        }
    );
}

#[test]
fn set_models_requires_main_model() {
    let err = InboundAction::parse(json!({ "action": "set-models" })).expect_err("missing");
    assert!(matches!(err, AppError::InvalidInput(ref msg) if msg.contains("mainModel")));
}

#[test]
fn run_command_requires_command() {
    let err = InboundAction::parse(json!({ "action": "run-command", "command": " " }))
        .expect_err("blank");
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[test]
fn add_message_defaults_to_acknowledged_user_turn() {
    let action =
        InboundAction::parse(json!({ "action": "add-message", "content": "note" })).expect("parses");

    assert_eq!(
        action,
        InboundAction::AddMessage {
            content: "note".into(),
            role: Role::User,
            acknowledge: true,
        }
    );
}

#[test]
fn add_message_accepts_assistant_without_ack() {
    let action = InboundAction::parse(json!({
        "action": "add-message",
        "content": "done",
        "role": "assistant",
        "acknowledge": false,
    }))
    .expect("parses");

    assert!(matches!(
        action,
        InboundAction::AddMessage {
            role: Role::Assistant,
            acknowledge: false,
            ..
        }
    ));
}

#[test]
fn apply_edits_requires_at_least_one_edit() {
    let err = InboundAction::parse(json!({ "action": "apply-edits", "edits": [] }))
        .expect_err("empty");
    assert!(matches!(err, AppError::InvalidInput(ref msg) if msg.contains("edits")));
}

#[test]
fn apply_edits_keeps_order() {
    let action = InboundAction::parse(json!({
        "action": "apply-edits",
        "edits": [
            { "path": "a.txt", "original": "1", "updated": "2" },
            { "path": "b.txt", "original": "", "updated": "new" },
        ],
    }))
    .expect("parses");

    let InboundAction::ApplyEdits { edits } = action else {
        panic!("expected apply-edits");
    };
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0].path, "a.txt");
    assert_eq!(edits[1].updated, "new");
}

#[test]
fn update_env_vars_maps_null_to_none() {
    let action = InboundAction::parse(json!({
        "action": "update-env-vars",
        "environmentVariables": { "OPENAI_API_KEY": "sk-test", "UNSET_ME": null, "PORT": 8080 },
    }))
    .expect("parses");

    let InboundAction::UpdateEnvVars {
        environment_variables,
    } = action
    else {
        panic!("expected update-env-vars");
    };
    assert_eq!(
        environment_variables.get("OPENAI_API_KEY"),
        Some(&Some("sk-test".to_owned()))
    );
    assert_eq!(environment_variables.get("UNSET_ME"), Some(&None));
    assert_eq!(environment_variables.get("PORT"), Some(&Some("8080".to_owned())));
}

#[test]
fn control_actions_parse() {
    assert_eq!(
        InboundAction::parse(json!({ "action": "answer-question", "answer": "y" })).expect("answer"),
        InboundAction::AnswerQuestion { answer: "y".into() }
    );
    assert_eq!(
        InboundAction::parse(json!({ "action": "interrupt-response" })).expect("interrupt"),
        InboundAction::InterruptResponse
    );
}

#[test]
fn every_known_action_round_trips_its_name() {
    assert_eq!(KNOWN_ACTIONS.len(), 10);
    assert!(!KNOWN_ACTIONS.contains(&"set-files"));

    let action = InboundAction::parse(json!({ "action": "drop-file", "path": "x" })).expect("drop");
    assert!(KNOWN_ACTIONS.contains(&action.name()));
}

// ── Outbound ────────────────────────────────────────────

#[test]
fn init_serializes_with_listen_to() {
    let message = OutboundMessage::Init {
        base_dir: "/repo".into(),
        listen_to: vec!["prompt".into()],
        input_history_file: None,
    };
    let value = serde_json::to_value(&message).expect("serialize");

    assert_eq!(value["action"], "init");
    assert_eq!(value["baseDir"], "/repo");
    assert_eq!(value["listenTo"], json!(["prompt"]));
}

#[test]
fn chunk_response_omits_terminal_fields() {
    let message = OutboundMessage::Response(ResponseEvent::chunk("Hel", None));
    let value = serde_json::to_value(&message).expect("serialize");

    assert_eq!(value["action"], "response");
    assert_eq!(value["finished"], false);
    assert_eq!(value["content"], "Hel");
    assert!(value.get("editedFiles").is_none());
    assert!(value.get("commitHash").is_none());
    assert!(value.get("reflectedMessage").is_none());
}

#[test]
fn terminal_response_carries_commit_fields() {
    let event = ResponseEvent {
        finished: true,
        content: "done".into(),
        edited_files: Some(vec!["a.rs".into()]),
        commit_hash: Some("abc1234".into()),
        commit_message: Some("fix: a".into()),
        diff: Some("diff --git".into()),
        reflected_message: Some("lint errors".into()),
        ..ResponseEvent::default()
    };
    let value = serde_json::to_value(&OutboundMessage::Response(event)).expect("serialize");

    assert_eq!(value["editedFiles"], json!(["a.rs"]));
    assert_eq!(value["commitHash"], "abc1234");
    assert_eq!(value["commitMessage"], "fix: a");
    assert_eq!(value["reflectedMessage"], "lint errors");
}

#[test]
fn context_files_list_read_only_flags() {
    let message = OutboundMessage::UpdateContextFiles {
        files: vec![
            ContextEntry {
                path: "a.rs".into(),
                read_only: false,
            },
            ContextEntry {
                path: "b.rs".into(),
                read_only: true,
            },
        ],
    };
    let value = serde_json::to_value(&message).expect("serialize");

    assert_eq!(value["action"], "update-context-files");
    assert_eq!(value["files"][1]["path"], "b.rs");
    assert_eq!(value["files"][1]["readOnly"], true);
}

#[test]
fn set_models_uses_camel_case() {
    let message = OutboundMessage::SetModels(ModelsUpdate {
        main_model: "gpt-4o".into(),
        weak_model: "gpt-4o-mini".into(),
        reasoning_effort: Some("high".into()),
        thinking_tokens: None,
        edit_format: "diff".into(),
        info: ModelInfo::default(),
        error: None,
    });
    let value = serde_json::to_value(&message).expect("serialize");

    assert_eq!(value["action"], "set-models");
    assert_eq!(value["mainModel"], "gpt-4o");
    assert_eq!(value["weakModel"], "gpt-4o-mini");
    assert_eq!(value["reasoningEffort"], "high");
    assert_eq!(value["editFormat"], "diff");
}

#[test]
fn ask_question_and_prompt_finished_shapes() {
    let ask = serde_json::to_value(&OutboundMessage::AskQuestion {
        question: "Edit the files?".into(),
        subject: None,
        is_group_question: true,
        default_answer: "y".into(),
    })
    .expect("serialize");
    assert_eq!(ask["action"], "ask-question");
    assert_eq!(ask["isGroupQuestion"], true);
    assert_eq!(ask["defaultAnswer"], "y");

    let finished = serde_json::to_value(&OutboundMessage::PromptFinished {
        prompt_id: "p-9".into(),
    })
    .expect("serialize");
    assert_eq!(finished, json!({ "action": "prompt-finished", "promptId": "p-9" }));
}
