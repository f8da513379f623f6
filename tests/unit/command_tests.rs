//! Unit tests for slash-command splitting, classification and recompute sets.

use pair_bridge::commands::{classify, recompute_after, CommandClass};
use pair_bridge::context::Recompute;
use pair_bridge::engine::builtin::commands::split_command;

#[test]
fn split_separates_name_and_arguments() {
    assert_eq!(split_command("/add src/a.rs src/b.rs"), ("/add", "src/a.rs src/b.rs"));
    assert_eq!(split_command("  /clear  "), ("/clear", ""));
    assert_eq!(split_command("/think-tokens   8k "), ("/think-tokens", "8k"));
}

#[test]
fn bang_shorthand_keeps_its_command() {
    assert_eq!(split_command("/!ls -la"), ("/!", "ls -la"));
    assert_eq!(split_command("/! cargo test"), ("/!", "cargo test"));
}

#[test]
fn run_and_bang_are_external_with_their_command() {
    assert_eq!(
        classify("/run cargo build", None),
        CommandClass::External("cargo build".into())
    );
    assert_eq!(classify("/!make", None), CommandClass::External("make".into()));
    assert_eq!(classify("/run", None), CommandClass::Plain);
}

#[test]
fn bare_test_uses_configured_command() {
    assert_eq!(
        classify("/test", Some("cargo test")),
        CommandClass::External("cargo test".into())
    );
    assert_eq!(classify("/test", None), CommandClass::Plain);
    assert_eq!(
        classify("/test pytest -q", Some("cargo test")),
        CommandClass::External("pytest -q".into())
    );
}

#[test]
fn tokens_commit_and_paste_have_their_own_class() {
    assert_eq!(classify("/tokens", None), CommandClass::External("/tokens".into()));
    assert_eq!(classify("/commit wip", None), CommandClass::Commit);
    assert_eq!(classify("/paste note", None), CommandClass::Paste);
    assert_eq!(classify("/clear", None), CommandClass::Plain);
}

#[test]
fn recompute_sets_follow_the_command() {
    assert_eq!(recompute_after("/paste"), Recompute::CONTEXT_FILES);
    assert_eq!(recompute_after("/clear"), Recompute::TOKENS);
    assert_eq!(
        recompute_after("/map-refresh"),
        Recompute::REPO_MAP | Recompute::AUTOCOMPLETION
    );
    assert_eq!(recompute_after("/reasoning-effort"), Recompute::MODELS);
    assert_eq!(recompute_after("/think-tokens"), Recompute::MODELS);

    let file_set = Recompute::CONTEXT_FILES | Recompute::AUTOCOMPLETION | Recompute::TOKENS;
    for name in ["/reset", "/drop", "/add", "/read-only"] {
        assert_eq!(recompute_after(name), file_set, "{name}");
    }
}

#[test]
fn map_and_unknown_commands_recompute_nothing() {
    assert!(recompute_after("/map").is_empty());
    assert!(recompute_after("/help").is_empty());
    assert!(recompute_after("/run").is_empty());
}
