//! Unit tests for the streamed chat-completions decoder and request body.

use serde_json::json;

use pair_bridge::engine::builtin::client::{request_body, SseParser, StreamDelta, Usage};
use pair_bridge::models::{ChatMessage, ModelRegistry};

#[test]
fn content_deltas_are_decoded_in_order() {
    let mut parser = SseParser::new();
    let deltas = parser.push(concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
    ));

    assert_eq!(
        deltas,
        vec![
            StreamDelta::Content("Hel".into()),
            StreamDelta::Content("lo".into()),
        ]
    );
}

#[test]
fn lines_split_across_pushes_are_buffered() {
    let mut parser = SseParser::new();

    assert!(parser.push("data: {\"choices\":[{\"delta\":{\"con").is_empty());
    let deltas = parser.push("tent\":\"x\"}}]}\r\n");

    assert_eq!(deltas, vec![StreamDelta::Content("x".into())]);
}

#[test]
fn multibyte_character_split_across_pushes_survives() {
    let mut parser = SseParser::new();
    let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
    let cut = line.iter().position(|&byte| byte == 0xC3).expect("é lead byte") + 1;

    assert!(parser.push(&line[..cut]).is_empty());
    let deltas = parser.push(&line[cut..]);

    assert_eq!(deltas, vec![StreamDelta::Content("café".into())]);
}

#[test]
fn usage_and_done_are_reported() {
    let mut parser = SseParser::new();
    let deltas = parser.push(concat!(
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n",
        "data: [DONE]\n",
    ));

    assert_eq!(
        deltas,
        vec![
            StreamDelta::Usage(Usage {
                prompt_tokens: 12,
                completion_tokens: 3,
            }),
            StreamDelta::Done,
        ]
    );
}

#[test]
fn comments_empty_deltas_and_garbage_are_skipped() {
    let mut parser = SseParser::new();
    let deltas = parser.push(concat!(
        ": keep-alive\n",
        "event: ping\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
        "data: not json\n",
    ));

    assert!(deltas.is_empty());
}

#[test]
fn streaming_body_requests_usage() {
    let model = ModelRegistry::new(&[], "PAIR_BRIDGE_SSE_TEST_KEY").resolve("gpt-4o", None, None);
    let body = request_body(&model, &[ChatMessage::user("hi")], true);

    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["stream"], true);
    assert_eq!(body["stream_options"], json!({ "include_usage": true }));
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "hi" }]));
}

#[test]
fn extra_body_is_flattened_and_other_params_kept() {
    let mut model =
        ModelRegistry::new(&[], "PAIR_BRIDGE_SSE_TEST_KEY").resolve("o3-mini", None, None);
    model.set_reasoning_effort("low");
    model.set_thinking_tokens("1k").expect("valid");

    let body = request_body(&model, &[], false);

    assert_eq!(body["stream"], false);
    assert!(body.get("stream_options").is_none());
    assert!(body.get("extra_body").is_none());
    assert_eq!(body["reasoning_effort"], "low");
    assert_eq!(body["thinking"]["budget_tokens"], 1024);
}
