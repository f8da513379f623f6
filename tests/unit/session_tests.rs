//! Unit tests for session file sets, conversation settling and derivation.

use std::path::PathBuf;

use pair_bridge::models::session::ACKNOWLEDGEMENT;
use pair_bridge::models::{
    AddOutcome, ChatMessage, CommitInfo, EditMode, ModelDescriptor, ModelRegistry, Role, Session,
};
use pair_bridge::AppError;

fn model(name: &str) -> ModelDescriptor {
    ModelRegistry::new(&[], "PAIR_BRIDGE_TEST_KEY").resolve(name, None, None)
}

fn session() -> Session {
    Session::new(
        PathBuf::from("/repo"),
        model("gpt-4o"),
        EditMode::Code,
        "diff".into(),
    )
}

// ── File sets ───────────────────────────────────────────

#[test]
fn editable_then_read_only_moves_the_path() {
    let mut s = session();

    assert_eq!(s.add_editable("src/a.rs"), AddOutcome::Added);
    assert_eq!(s.add_read_only("src/a.rs"), AddOutcome::Moved);

    assert!(s.editable().is_empty());
    assert_eq!(s.read_only(), ["src/a.rs".to_owned()]);
}

#[test]
fn adding_twice_to_the_same_set_is_reported() {
    let mut s = session();

    s.add_editable("a.rs");
    assert_eq!(s.add_editable("a.rs"), AddOutcome::AlreadyPresent);
    assert_eq!(s.editable().len(), 1);
}

#[test]
fn context_entries_list_editable_then_read_only_sorted() {
    let mut s = session();
    s.add_read_only("z.md");
    s.add_editable("b.rs");
    s.add_read_only("c.md");
    s.add_editable("a.rs");

    let entries: Vec<(String, bool)> = s
        .context_entries()
        .into_iter()
        .map(|entry| (entry.path, entry.read_only))
        .collect();

    assert_eq!(
        entries,
        vec![
            ("a.rs".to_owned(), false),
            ("b.rs".to_owned(), false),
            ("c.md".to_owned(), true),
            ("z.md".to_owned(), true),
        ]
    );
}

#[test]
fn drop_path_removes_from_either_set() {
    let mut s = session();
    s.add_editable("a.rs");
    s.add_read_only("b.md");

    assert!(s.drop_path("b.md"));
    assert!(!s.drop_path("b.md"));
    assert_eq!(s.tracked_paths(), vec!["a.rs".to_owned()]);

    s.drop_all();
    assert!(s.tracked_paths().is_empty());
}

// ── Conversation ────────────────────────────────────────

#[test]
fn record_then_move_back_settles_the_exchange() {
    let mut s = session();

    s.record_exchange("hi", "hello");
    assert_eq!(s.cur_messages.len(), 2);
    assert!(s.done_messages.is_empty());

    s.move_back_cur_messages(None);
    assert!(s.cur_messages.is_empty());
    assert_eq!(s.done_messages, vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
}

#[test]
fn move_back_with_message_appends_acknowledgement() {
    let mut s = session();
    s.record_exchange("plan", "proposal");

    s.move_back_cur_messages(Some("I made those changes to the files."));

    let tail: Vec<&ChatMessage> = s.done_messages.iter().rev().take(2).collect();
    assert_eq!(tail[0], &ChatMessage::assistant(ACKNOWLEDGEMENT));
    assert_eq!(tail[1], &ChatMessage::user("I made those changes to the files."));
}

#[test]
fn interrupted_exchange_is_marked() {
    let mut s = session();

    s.settle_interrupted("write a poem", "Roses are");

    let last = s.done_messages.last().expect("settled");
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Roses are (interrupted)");
    assert!(s.cur_messages.is_empty());
}

#[test]
fn record_commit_updates_history_and_last_commit() {
    let mut s = session();

    s.record_commit(CommitInfo {
        hash: "abc1234".into(),
        message: "feat: one".into(),
    });
    s.record_commit(CommitInfo {
        hash: "def5678".into(),
        message: "feat: two".into(),
    });

    assert_eq!(s.commit_hashes, vec!["abc1234".to_owned(), "def5678".to_owned()]);
    assert_eq!(s.last_commit.as_ref().map(|c| c.hash.as_str()), Some("def5678"));
}

// ── Derivation ──────────────────────────────────────────

#[test]
fn derive_keeps_state_and_changes_identity() {
    let mut s = session();
    s.add_editable("a.rs");
    s.record_exchange("q", "a");
    s.total_cost = 0.5;

    let derived = s.derive(EditMode::Ask, model("gpt-4.1"), "whole".into());

    assert_ne!(derived.id, s.id);
    assert_eq!(derived.mode, EditMode::Ask);
    assert_eq!(derived.model.name, "gpt-4.1");
    assert_eq!(derived.edit_format, "whole");
    assert_eq!(derived.editable(), s.editable());
    assert_eq!(derived.cur_messages, s.cur_messages);
    assert!((derived.total_cost - 0.5).abs() < f64::EPSILON);
}

#[test]
fn editor_starts_clean_with_editor_model() {
    let mut s = Session::new(
        PathBuf::from("/repo"),
        model("o3-mini"),
        EditMode::Architect,
        "diff".into(),
    );
    s.add_editable("a.rs");
    s.record_exchange("plan", "proposal");
    s.map_tokens = 1024;
    s.total_cost = 1.25;

    let editor = s.spawn_editor();

    assert_eq!(editor.model.name, "gpt-4o");
    assert_eq!(editor.mode, EditMode::Code);
    assert_eq!(editor.edit_format, "editor-diff");
    assert!(editor.done_messages.is_empty());
    assert!(editor.cur_messages.is_empty());
    assert_eq!(editor.map_tokens, 0);
    assert!(!editor.suggest_shell_commands);
    assert_eq!(editor.editable(), s.editable());
    assert!((editor.total_cost - 1.25).abs() < f64::EPSILON);
}

#[test]
fn editor_without_editor_model_reuses_main_model() {
    let s = session();
    assert_eq!(s.spawn_editor().model.name, "gpt-4o");
}

#[test]
fn edit_mode_parses_known_names() {
    assert_eq!("architect".parse::<EditMode>().expect("mode"), EditMode::Architect);
    assert_eq!("context".parse::<EditMode>().expect("mode"), EditMode::Context);
    assert!(EditMode::Architect.edits_files());
    assert!(!EditMode::Ask.edits_files());

    let err = "wizard".parse::<EditMode>().expect_err("unknown");
    assert!(matches!(err, AppError::InvalidInput(ref msg) if msg == "unknown mode: wizard"));
}
