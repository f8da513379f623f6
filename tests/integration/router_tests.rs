//! Inbound routing: immediate answers and interrupts, queued actions,
//! rejected frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use pair_bridge::confirm::{Answer, ConfirmationBroker, PendingConfirmation};
use pair_bridge::protocol::{EventKind, Frame, InboundAction, Outbound};
use pair_bridge::transport::reader::{InboundRouter, QueuedAction};
use pair_bridge::AppError;

use super::test_helpers::{drain, logs};

struct Routed {
    router: InboundRouter,
    broker: Arc<ConfirmationBroker>,
    interrupt: Arc<AtomicBool>,
    outbound: Outbound,
    frames: mpsc::UnboundedReceiver<Frame>,
    queue: mpsc::UnboundedReceiver<QueuedAction>,
}

fn routed() -> Routed {
    let (outbound, frames) = Outbound::channel();
    let (tx, queue) = mpsc::unbounded_channel();
    let broker = Arc::new(ConfirmationBroker::new());
    let interrupt = Arc::new(AtomicBool::new(false));
    let router = InboundRouter::new(
        Arc::clone(&broker),
        Arc::clone(&interrupt),
        tx,
        outbound.clone(),
    );
    Routed {
        router,
        broker,
        interrupt,
        outbound,
        frames,
        queue,
    }
}

fn acks(frames: &[Frame]) -> Vec<&Frame> {
    frames
        .iter()
        .filter(|frame| frame.event == EventKind::Ack)
        .collect()
}

fn pending(question: &str) -> PendingConfirmation {
    PendingConfirmation {
        question: question.into(),
        subject: None,
        default_answer: "y".into(),
        group_scope: false,
    }
}

// ── Immediate actions ───────────────────────────────────

#[tokio::test]
async fn answer_reaches_the_suspended_question() {
    let mut r = routed();
    let line = r#"{"event":"message","id":"a1","data":{"action":"answer-question","answer":"a"}}"#;

    let (answer, routed_ok) = tokio::join!(
        r.broker.ask(pending("Create new file?"), &r.outbound),
        async {
            tokio::task::yield_now().await;
            r.router.route_line(line)
        },
    );

    assert!(routed_ok);
    assert_eq!(answer.expect("answered"), Answer::Always);
    let frames = drain(&mut r.frames);
    let ack = acks(&frames);
    assert_eq!(ack.len(), 1);
    assert_eq!(ack[0].id.as_deref(), Some("a1"));
    assert_eq!(ack[0].data["success"], true);
    assert!(r.queue.try_recv().is_err(), "answers bypass the queue");
}

#[test]
fn answer_without_a_question_is_still_acknowledged() {
    let mut r = routed();

    assert!(r
        .router
        .route_line(r#"{"event":"message","id":"a2","data":{"action":"answer-question","answer":"y"}}"#));

    let frames = drain(&mut r.frames);
    assert_eq!(acks(&frames)[0].data["success"], true);
}

#[test]
fn interrupt_sets_the_flag_and_acks() {
    let mut r = routed();

    assert!(r
        .router
        .route_line(r#"{"event":"message","id":"i1","data":{"action":"interrupt-response"}}"#));

    assert!(r.interrupt.load(Ordering::SeqCst));
    let frames = drain(&mut r.frames);
    assert_eq!(acks(&frames)[0].id.as_deref(), Some("i1"));
    assert!(r.queue.try_recv().is_err());
}

// ── Queued actions ──────────────────────────────────────

#[test]
fn other_actions_are_queued_with_their_id() {
    let mut r = routed();

    assert!(r
        .router
        .route_line(r#"{"event":"message","id":"p1","data":{"action":"prompt","prompt":"hi"}}"#));

    let queued = r.queue.try_recv().expect("queued");
    assert_eq!(queued.id.as_deref(), Some("p1"));
    assert!(matches!(queued.action, InboundAction::Prompt(ref req) if req.prompt == "hi"));
    assert!(drain(&mut r.frames).is_empty(), "queued actions are acked by the loop");
}

#[test]
fn closed_queue_stops_routing() {
    let r = routed();
    drop(r.queue);

    assert!(!r
        .router
        .route_line(r#"{"event":"message","data":{"action":"run-command","command":"/clear"}}"#));
}

// ── Rejected frames ─────────────────────────────────────

#[test]
fn unknown_action_gets_an_error_ack() {
    let mut r = routed();

    assert!(r
        .router
        .route_line(r#"{"event":"message","id":"u1","data":{"action":"set-files","files":[]}}"#));

    let frames = drain(&mut r.frames);
    assert!(logs(&frames, "error").is_empty());
    let ack = acks(&frames);
    assert_eq!(ack[0].id.as_deref(), Some("u1"));
    assert_eq!(ack[0].data["error"], "Unknown action: set-files");
}

#[test]
fn missing_field_is_logged_and_acked() {
    let mut r = routed();

    assert!(r
        .router
        .route_line(r#"{"event":"message","id":"m1","data":{"action":"add-file"}}"#));

    let frames = drain(&mut r.frames);
    let expected = "missing required field `path` for add-file";
    assert_eq!(logs(&frames, "error"), vec![expected.to_owned()]);
    assert_eq!(acks(&frames)[0].data["error"], expected);
    assert!(r.queue.try_recv().is_err());
}

#[test]
fn malformed_and_foreign_frames_are_skipped() {
    let mut r = routed();

    assert!(r.router.route_line("{not json"));
    assert!(r.router.route_line("   "));
    assert!(r.router.route_line(r#"{"event":"ack","id":"x","data":{"success":true}}"#));

    assert!(drain(&mut r.frames).is_empty());
    assert!(r.queue.try_recv().is_err());
}

// ── Disconnect ──────────────────────────────────────────

#[tokio::test]
async fn disconnect_releases_the_question_and_interrupts() {
    let r = routed();

    let (answer, ()) = tokio::join!(
        r.broker.ask(pending("Run shell command?"), &r.outbound),
        async {
            tokio::task::yield_now().await;
            r.router.disconnect();
        },
    );

    assert!(matches!(answer, Err(AppError::Disconnected(_))));
    assert!(r.interrupt.load(Ordering::SeqCst));
    assert!(!r.broker.answer("y"));
}
