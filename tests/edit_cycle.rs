//! Integration tests for full edit cycles against in-process edit services

use async_trait::async_trait;
use drawover::annotation::PRIMARY_BUTTON;
use drawover::remote::{EditRequest, EditService};
use drawover::{EditSession, Error, InputEvent, Phase, Result, Sample, SessionConfig, SessionState, SubmitOutcome, Tool};
use std::sync::atomic::{AtomicUsize, Ordering};
use drawover::capture::CaptureScene;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::Notify;

/// Replies with a fixed markup and records every request
struct Recording {
    reply: String,
    requests: Arc<Mutex<Vec<EditRequest>>>,
}

#[async_trait]
impl EditService for Recording {
    async fn edit(&self, request: EditRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }
}

/// Blocks until released, so tests can act while a request is in flight
struct Gated {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    reply: Result<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EditService for Gated {
    async fn edit(&self, _request: EditRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        match &self.reply {
            Ok(m) => Ok(m.clone()),
            Err(e) => Err(Error::Network(e.to_string())),
        }
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        viewport: drawover::Viewport { width: 200, height: 120 },
        ..Default::default()
    }
}

fn draw_three_samples(session: &EditSession) {
    session.dispatch(InputEvent::PointerDown(Sample::new(20.0, 30.0, 0.5)));
    session.dispatch(InputEvent::PointerMove {
        sample: Sample::new(60.0, 40.0, 0.5),
        buttons: PRIMARY_BUTTON,
    });
    session.dispatch(InputEvent::PointerMove {
        sample: Sample::new(100.0, 45.0, 0.5),
        buttons: PRIMARY_BUTTON,
    });
    session.dispatch(InputEvent::PointerUp);
}

#[tokio::test]
async fn hello_world_end_to_end() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Recording {
        reply: "<p>Hello World</p>".to_string(),
        requests: requests.clone(),
    });

    session.dispatch(InputEvent::Toggle);
    session.dispatch(InputEvent::SetTool { tool: Tool::Modify });
    draw_three_samples(&session);
    assert_eq!(session.strokes().len(), 1);
    assert_eq!(session.strokes()[0].tool(), Tool::Modify);

    let outcome = session.submit_edit().await.expect("submit");
    assert_eq!(outcome, SubmitOutcome::Applied);
    assert_eq!(
        session.history().snapshots(),
        &["<p>Hello</p>".to_string(), "<p>Hello World</p>".to_string()]
    );
    assert!(session.strokes().is_empty());

    let sent = requests.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].html, "<p>Hello</p>");
    assert!(sent[0].drawover_url.starts_with("data:image/jpeg;base64,"));
    assert!(sent[0].page_url.starts_with("data:image/jpeg;base64,"));
    // The annotated capture carries red ink, the clean page does not
    assert_ne!(sent[0].drawover_url, sent[0].page_url);
}

#[tokio::test]
async fn n_edits_then_undo() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Recording {
        reply: "<p>Edited page</p>".to_string(),
        requests,
    });
    let n = 3;
    for _ in 0..n {
        session.dispatch(InputEvent::Toggle);
        draw_three_samples(&session);
        assert_eq!(session.submit_edit().await.unwrap(), SubmitOutcome::Applied);
    }
    assert!(session.undo());
    assert_eq!(session.history_len(), n);
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Gated {
        entered: entered.clone(),
        release: release.clone(),
        reply: Ok("<p>Hello World</p>".to_string()),
        calls: calls.clone(),
    });
    session.dispatch(InputEvent::Toggle);
    draw_three_samples(&session);

    let first = {
        let s = session.clone();
        tokio::spawn(async move { s.submit_edit().await })
    };
    entered.notified().await;
    assert_eq!(session.state(), SessionState::Requesting);
    assert!(!session.can_submit());
    assert_eq!(session.submit_edit().await.unwrap(), SubmitOutcome::Rejected);

    // Input is frozen while the request is in flight
    assert!(!session.dispatch(InputEvent::Clear));
    assert_eq!(session.strokes().len(), 1);

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), SubmitOutcome::Applied);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.history_len(), 2);
}

#[tokio::test]
async fn late_response_after_discard_is_dropped() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Gated {
        entered: entered.clone(),
        release: release.clone(),
        reply: Ok("<p>Too late</p>".to_string()),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    session.dispatch(InputEvent::Toggle);
    draw_three_samples(&session);

    let pending = {
        let s = session.clone();
        tokio::spawn(async move { s.submit_edit().await })
    };
    entered.notified().await;

    assert!(session.dispatch(InputEvent::Discard));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.phase(), Phase::Idle);

    release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), SubmitOutcome::Superseded);
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.current_markup(), "<p>Hello</p>");
}

#[tokio::test]
async fn rejected_request_preserves_strokes() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Gated {
        entered,
        release: release.clone(),
        reply: Err(Error::Other("503".into())),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    session.dispatch(InputEvent::Toggle);
    draw_three_samples(&session);
    let before = session.strokes();

    release.notify_one();
    let err = session.submit_edit().await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert_eq!(session.strokes(), before);
    assert!(!session.is_busy());
    assert_eq!(session.phase(), Phase::ActiveHasStrokes);

    // Retry succeeds path is open again
    assert!(session.can_submit());
}

#[tokio::test]
async fn click_without_drag_sends_nothing() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let session = EditSession::builder(config(), "<p>Hello</p>").build(Recording {
        reply: "<p>Hello World</p>".to_string(),
        requests: requests.clone(),
    });
    session.dispatch(InputEvent::Toggle);
    session.dispatch(InputEvent::PointerDown(Sample::new(40.0, 40.0, 0.5)));
    assert!(!session.can_submit());

    assert_eq!(session.submit_edit().await.unwrap(), SubmitOutcome::NoOp);
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.phase(), Phase::ActiveEmpty);
    assert!(!session.with_layer(|l| l.is_frozen()));
}

#[tokio::test]
async fn discard_during_overlay_capture_keeps_next_overlay_visible() {
    let slot: Arc<OnceLock<EditSession>> = Arc::new(OnceLock::new());
    let handle = slot.clone();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let session = EditSession::builder(config(), "<p>Hello</p>")
        .overlay_target(move |scene: &CaptureScene<'_>| -> Result<image::RgbaImage> {
            if let Some(session) = handle.get() {
                session.discard();
            }
            Ok(image::RgbaImage::new(scene.viewport.width, scene.viewport.height))
        })
        .build(Recording {
            reply: "<p>Never applied</p>".to_string(),
            requests: requests.clone(),
        });
    let _ = slot.set(session.clone());

    session.dispatch(InputEvent::Toggle);
    draw_three_samples(&session);
    assert_eq!(session.submit_edit().await.unwrap(), SubmitOutcome::Superseded);
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.history_len(), 1);

    session.dispatch(InputEvent::Toggle);
    draw_three_samples(&session);
    assert_eq!(session.strokes().len(), 1);
    assert!(session.with_layer(|l| l.frame().visible));
    assert!(!session.with_layer(|l| l.frame().paint_commands()).is_empty());
}
