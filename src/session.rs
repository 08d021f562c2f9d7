//! Edit session controller: one capture → request → apply cycle at a time.
//!
//! [`EditSession`] is a cloneable handle. The annotation layer and document
//! history live behind a mutex that is never held across an `.await`, so
//! input keeps flowing (and is dropped by the frozen layer) while a request
//! is in flight.
//!
//! Every cycle gets a token. [`EditSession::discard`] invalidates the token
//! of the cycle in flight, and a response arriving for an invalidated token
//! is dropped instead of landing in history.

use crate::annotation::{AnnotationLayer, CommittedStroke, InputEvent, OverlayFrame, Phase};
use crate::capture::{CanvasTarget, CaptureScene, CaptureTarget, Capturer, EncodedImage};
use crate::history::DocumentHistory;
use crate::remote::{validate_markup, EditRequest, EditService};
use crate::rendering::PaintCommand;
use crate::toolbar::{Toolbar, ToolbarPlacement};
use crate::{Error, Result, SessionConfig, Viewport};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

type OnStateHandler = Arc<dyn Fn(SessionState) + Send + Sync>;

/// Where the session is in its edit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Requesting,
    Applying,
    Failed,
}

impl SessionState {
    /// Drives the loading indicator and gates the submit affordance
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionState::Capturing | SessionState::Requesting | SessionState::Applying
        )
    }
}

/// How a call to [`EditSession::submit_edit`] ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing drawn; nothing captured or sent
    NoOp,
    /// Another cycle was already in flight
    Rejected,
    /// The response became the new snapshot
    Applied,
    /// The cycle was discarded before its response arrived
    Superseded,
}

struct Inner {
    layer: AnnotationLayer,
    history: DocumentHistory,
    state: SessionState,
    next_cycle: u64,
    live_cycle: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Region {
    Overlay,
    Page,
}

struct Targets {
    overlay: Box<dyn CaptureTarget>,
    page: Box<dyn CaptureTarget>,
}

/// Builder wiring capture targets and observers into an [`EditSession`]
pub struct SessionBuilder {
    config: SessionConfig,
    initial: String,
    overlay: Option<Box<dyn CaptureTarget>>,
    page: Option<Box<dyn CaptureTarget>>,
    layer: Option<AnnotationLayer>,
    on_state_change: Option<OnStateHandler>,
}

impl SessionBuilder {
    /// Region holding the live document with the overlay on top
    pub fn overlay_target(mut self, target: impl CaptureTarget + 'static) -> Self {
        self.overlay = Some(Box::new(target));
        self
    }

    /// Region holding the full scrollable page
    pub fn page_target(mut self, target: impl CaptureTarget + 'static) -> Self {
        self.page = Some(Box::new(target));
        self
    }

    /// Use a pre-configured layer (e.g. with a render handler attached)
    pub fn layer(mut self, layer: AnnotationLayer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn on_state_change<F>(mut self, cb: F) -> Self
    where
        F: Fn(SessionState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(cb));
        self
    }

    pub fn build(self, service: impl EditService + 'static) -> EditSession {
        self.build_shared(Arc::new(service))
    }

    pub fn build_shared(self, service: Arc<dyn EditService>) -> EditSession {
        let layer = self.layer.unwrap_or_else(|| {
            AnnotationLayer::new(self.config.stroke).with_backdrop(self.config.backdrop)
        });
        EditSession {
            inner: Arc::new(Mutex::new(Inner {
                layer,
                history: DocumentHistory::new(self.initial),
                state: SessionState::Idle,
                next_cycle: 0,
                live_cycle: None,
            })),
            targets: Arc::new(Targets {
                overlay: self.overlay.unwrap_or_else(|| Box::new(CanvasTarget::default())),
                page: self.page.unwrap_or_else(|| Box::new(CanvasTarget::default())),
            }),
            service,
            capturer: Capturer::new(self.config.capture),
            viewport: self.config.viewport,
            min_response_len: self.config.min_response_len,
            toolbar: Toolbar::default(),
            on_state_change: self.on_state_change,
        }
    }
}

/// Handle to one editing session
#[derive(Clone)]
pub struct EditSession {
    inner: Arc<Mutex<Inner>>,
    targets: Arc<Targets>,
    service: Arc<dyn EditService>,
    capturer: Capturer,
    viewport: Viewport,
    min_response_len: usize,
    toolbar: Toolbar,
    on_state_change: Option<OnStateHandler>,
}

impl EditSession {
    pub fn builder(config: SessionConfig, initial: impl Into<String>) -> SessionBuilder {
        SessionBuilder {
            config,
            initial: initial.into(),
            overlay: None,
            page: None,
            layer: None,
            on_state_change: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, state: SessionState) {
        if let Some(cb) = &self.on_state_change {
            cb(state);
        }
    }

    /// Feed one input event to the annotation layer. A discard while a cycle
    /// is in flight abandons that cycle.
    pub fn dispatch(&self, event: InputEvent) -> bool {
        let mut inner = self.lock();
        if inner.state.is_busy() && event == InputEvent::Discard {
            drop(inner);
            return self.discard();
        }
        inner.layer.handle(event)
    }

    /// Leave annotation mode, drop all ink and abandon any cycle in flight.
    /// Returns whether anything changed.
    pub fn discard(&self) -> bool {
        let (was_busy, changed) = {
            let mut inner = self.lock();
            let was_busy = inner.state.is_busy();
            let changed = was_busy || inner.layer.is_active() || inner.layer.has_ink();
            if let Some(token) = inner.live_cycle.take() {
                info!("discarding edit cycle {} in flight", token);
            }
            inner.layer.reset();
            inner.state = SessionState::Idle;
            (was_busy, changed)
        };
        if was_busy {
            self.notify(SessionState::Idle);
        }
        changed
    }

    /// Run one edit cycle.
    ///
    /// Returns `Ok(NoOp)` with nothing drawn and `Ok(Rejected)` while another
    /// cycle is in flight. Capture, transport and response failures leave
    /// history and strokes untouched and are returned as `Err`.
    pub async fn submit_edit(&self) -> Result<SubmitOutcome> {
        let (token, overlay_cmds, html) = {
            let mut inner = self.lock();
            if inner.state.is_busy() {
                debug!("submit rejected, cycle {:?} in flight", inner.live_cycle);
                return Ok(SubmitOutcome::Rejected);
            }
            // A click commits nothing, so only committed strokes count
            inner.layer.commit_in_progress();
            if inner.layer.strokes().is_empty() {
                debug!("submit ignored, nothing drawn");
                return Ok(SubmitOutcome::NoOp);
            }
            inner.next_cycle += 1;
            let token = inner.next_cycle;
            inner.live_cycle = Some(token);
            inner.layer.freeze();
            inner.state = SessionState::Capturing;
            let cmds = inner.layer.frame().paint_commands();
            (token, cmds, inner.history.current().to_string())
        };
        self.notify(SessionState::Capturing);
        info!("edit cycle {} started ({} overlay commands)", token, overlay_cmds.len());

        let drawover = match self.capture(Region::Overlay, Some(overlay_cmds)).await {
            Ok(image) => image,
            Err(err) => return self.fail(token, err),
        };

        {
            let mut inner = self.lock();
            if inner.live_cycle != Some(token) {
                debug!("cycle {} discarded during overlay capture", token);
                return Ok(SubmitOutcome::Superseded);
            }
            inner.layer.set_hidden(true);
        }

        let page = match self.capture(Region::Page, None).await {
            Ok(image) => image,
            Err(err) => return self.fail(token, err),
        };

        {
            let mut inner = self.lock();
            if inner.live_cycle != Some(token) {
                return Ok(SubmitOutcome::Superseded);
            }
            inner.state = SessionState::Requesting;
        }
        self.notify(SessionState::Requesting);

        let request = EditRequest {
            html,
            drawover_url: drawover.to_data_uri(),
            page_url: page.to_data_uri(),
        };
        let response = self
            .service
            .edit(request)
            .await
            .and_then(|markup| validate_markup(markup, self.min_response_len));

        let markup = match response {
            Ok(markup) => markup,
            Err(err) => return self.fail(token, err),
        };

        {
            let mut inner = self.lock();
            if inner.live_cycle != Some(token) {
                info!("dropping late response for discarded cycle {}", token);
                return Ok(SubmitOutcome::Superseded);
            }
            inner.state = SessionState::Applying;
            inner.history.push(markup);
            inner.layer.reset();
            inner.live_cycle = None;
            inner.state = SessionState::Idle;
            info!("edit cycle {} applied, history length {}", token, inner.history.len());
        }
        self.notify(SessionState::Applying);
        self.notify(SessionState::Idle);
        Ok(SubmitOutcome::Applied)
    }

    /// Rasterize and encode one region on the blocking pool
    async fn capture(&self, region: Region, overlay: Option<Vec<PaintCommand>>) -> Result<EncodedImage> {
        let targets = Arc::clone(&self.targets);
        let capturer = self.capturer;
        let viewport = self.viewport;
        tokio::task::spawn_blocking(move || {
            let target = match region {
                Region::Overlay => targets.overlay.as_ref(),
                Region::Page => targets.page.as_ref(),
            };
            let scene = CaptureScene {
                viewport,
                overlay: overlay.as_deref(),
            };
            capturer.capture(target, &scene)
        })
        .await
        .map_err(|e| Error::Capture(format!("capture task failed: {}", e)))?
    }

    fn fail(&self, token: u64, err: Error) -> Result<SubmitOutcome> {
        {
            let mut inner = self.lock();
            if inner.live_cycle != Some(token) {
                debug!("cycle {} failed after discard: {}", token, err);
                return Ok(SubmitOutcome::Superseded);
            }
            inner.state = SessionState::Failed;
            inner.live_cycle = None;
            inner.layer.unfreeze();
            inner.state = SessionState::Idle;
        }
        warn!("edit cycle {} failed: {}", token, err);
        self.notify(SessionState::Failed);
        self.notify(SessionState::Idle);
        Err(err)
    }

    /// Undo the last applied edit. Refused while a cycle is in flight.
    pub fn undo(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.is_busy() {
            return false;
        }
        inner.history.undo()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Whether the submit affordance should be enabled
    pub fn can_submit(&self) -> bool {
        let inner = self.lock();
        !inner.state.is_busy() && inner.layer.has_ink()
    }

    pub fn current_markup(&self) -> String {
        self.lock().history.current().to_string()
    }

    pub fn history(&self) -> DocumentHistory {
        self.lock().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn phase(&self) -> Phase {
        self.lock().layer.phase()
    }

    pub fn strokes(&self) -> Vec<CommittedStroke> {
        self.lock().layer.strokes().to_vec()
    }

    /// Inspect the layer without cloning it
    pub fn with_layer<R>(&self, f: impl FnOnce(&AnnotationLayer) -> R) -> R {
        f(&self.lock().layer)
    }

    /// SVG of what the overlay currently shows
    pub fn overlay_svg(&self) -> String {
        let inner = self.lock();
        let frame: OverlayFrame<'_> = inner.layer.frame();
        frame.to_svg(self.viewport.width, self.viewport.height)
    }

    /// Where the toolbar goes for a pointer at `pointer_y` (viewport space)
    pub fn toolbar_placement(&self, pointer_y: Option<f64>) -> ToolbarPlacement {
        let inner = self.lock();
        self.toolbar.placement(&inner.layer, pointer_y, self.viewport)
    }
}
