//! Unit tests for search/replace block parsing and application.

use pair_bridge::engine::builtin::edits::{apply_blocks, parse_edit_blocks, replace_once};
use pair_bridge::engine::EditBlock;
use pair_bridge::AppError;

// ── Parsing ─────────────────────────────────────────────

#[test]
fn fenced_block_with_path_is_parsed() {
    let reply = "Here is the fix:\n\nsrc/lib.rs\n```rust\n<<<<<<< SEARCH\nfn a() {}\n=======\nfn a() -> u8 { 1 }\n>>>>>>> REPLACE\n```\n";

    let blocks = parse_edit_blocks(reply);

    assert_eq!(
        blocks,
        vec![EditBlock {
            path: "src/lib.rs".into(),
            original: "fn a() {}\n".into(),
            updated: "fn a() -> u8 { 1 }\n".into(),
        }]
    );
}

#[test]
fn block_without_path_reuses_previous_file() {
    let reply = "a.txt\n<<<<<<< SEARCH\none\n=======\n1\n>>>>>>> REPLACE\n\n<<<<<<< SEARCH\ntwo\n=======\n2\n>>>>>>> REPLACE\n";

    let blocks = parse_edit_blocks(reply);

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].path, "a.txt");
    assert_eq!(blocks[1].original, "two\n");
}

#[test]
fn empty_search_section_is_kept_empty() {
    let reply = "new.txt\n<<<<<<< SEARCH\n=======\nhello\n>>>>>>> REPLACE\n";

    let blocks = parse_edit_blocks(reply);

    assert_eq!(blocks[0].original, "");
    assert_eq!(blocks[0].updated, "hello\n");
}

#[test]
fn unterminated_block_is_ignored() {
    let reply = "a.txt\n<<<<<<< SEARCH\none\n=======\n1\n";
    assert!(parse_edit_blocks(reply).is_empty());
}

#[test]
fn prose_without_markers_has_no_blocks() {
    assert!(parse_edit_blocks("Just an explanation, no edits.").is_empty());
}

// ── Replacing ───────────────────────────────────────────

#[test]
fn exact_match_is_replaced_once() {
    let out = replace_once("a\nb\na\n", "a\n", "x\n").expect("replaced");
    assert_eq!(out, "x\nb\na\n");
}

#[test]
fn trailing_whitespace_differences_are_tolerated() {
    let out = replace_once("fn a() {   \n    1\n}\n", "fn a() {\n    1\n}\n", "fn b() {}\n")
        .expect("loose match");
    assert_eq!(out, "fn b() {}\n");
}

#[test]
fn empty_original_appends() {
    let out = replace_once("first", "", "second\n").expect("append");
    assert_eq!(out, "first\nsecond\n");
}

#[test]
fn missing_search_text_is_an_edit_error() {
    let err = replace_once("abc\n", "xyz\n", "q\n").expect_err("not found");
    assert!(matches!(err, AppError::Edit(ref msg) if msg.contains("xyz")));
}

// ── Applying ────────────────────────────────────────────

#[test]
fn apply_blocks_edits_and_creates_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("a.txt"), "hello world\n").expect("seed");

    let blocks = vec![
        EditBlock {
            path: "a.txt".into(),
            original: "hello world\n".into(),
            updated: "hello bridge\n".into(),
        },
        EditBlock {
            path: "nested/new.txt".into(),
            original: String::new(),
            updated: "created\n".into(),
        },
        EditBlock {
            path: "a.txt".into(),
            original: "bridge".into(),
            updated: "pair".into(),
        },
    ];

    let edited = apply_blocks(temp.path(), &blocks).expect("applied");

    assert_eq!(edited, vec!["a.txt".to_owned(), "nested/new.txt".to_owned()]);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.txt")).expect("read"),
        "hello pair\n"
    );
    assert_eq!(
        std::fs::read_to_string(temp.path().join("nested/new.txt")).expect("read"),
        "created\n"
    );
}

#[test]
fn missing_file_with_search_text_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let blocks = vec![EditBlock {
        path: "ghost.txt".into(),
        original: "x".into(),
        updated: "y".into(),
    }];

    let err = apply_blocks(temp.path(), &blocks).expect_err("missing");
    assert!(matches!(err, AppError::Edit(ref msg) if msg.contains("ghost.txt")));
}

#[test]
fn earlier_blocks_stay_applied_after_a_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("a.txt"), "one\n").expect("seed");

    let blocks = vec![
        EditBlock {
            path: "a.txt".into(),
            original: "one\n".into(),
            updated: "two\n".into(),
        },
        EditBlock {
            path: "a.txt".into(),
            original: "three\n".into(),
            updated: "four\n".into(),
        },
    ];

    assert!(apply_blocks(temp.path(), &blocks).is_err());
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.txt")).expect("read"),
        "two\n"
    );
}

#[test]
fn block_escaping_the_root_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let blocks = vec![EditBlock {
        path: "../outside.txt".into(),
        original: String::new(),
        updated: "nope".into(),
    }];

    let err = apply_blocks(temp.path(), &blocks).expect_err("escape");
    assert!(matches!(err, AppError::PathViolation(_)));
}
