//! Drawover
//!
//! Headless core of a "sketch over a page" editor: free-hand strokes drawn
//! over a rendered document are captured, sent with the document's markup to
//! an edit service, and the returned markup becomes the next document state.
//!
//! # Pieces
//!
//! - [`stroke`]: pointer samples to smoothed outline paths
//! - [`annotation`]: the input state machine holding strokes and tool state
//! - [`capture`]: bounded JPEG captures of injected screen regions
//! - [`session`]: one edit cycle at a time, from capture to history
//! - [`history`]: linear snapshot history with destructive undo
//! - [`remote`]: the edit service seam and its HTTP client
//!
//! # Example
//!
//! ```no_run
//! use drawover::capture::CanvasTarget;
//! use drawover::remote::HttpEditService;
//! use drawover::{EditSession, InputEvent, Sample, SessionConfig};
//!
//! # async fn run() -> drawover::Result<()> {
//! let config = SessionConfig {
//!     endpoint: "http://localhost:3000/api/refactor".to_string(),
//!     ..Default::default()
//! };
//! let service = HttpEditService::new(&config)?;
//! let session = EditSession::builder(config, "<p>Hello</p>")
//!     .overlay_target(CanvasTarget::default())
//!     .page_target(CanvasTarget::default())
//!     .build(service);
//!
//! session.dispatch(InputEvent::Toggle);
//! session.dispatch(InputEvent::PointerDown(Sample::new(10.0, 10.0, 0.5)));
//! session.dispatch(InputEvent::PointerMove { sample: Sample::new(40.0, 20.0, 0.5), buttons: 1 });
//! session.dispatch(InputEvent::PointerUp);
//! session.submit_edit().await?;
//! println!("{}", session.current_markup());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path as FsPath, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod annotation;
pub mod capture;
pub mod history;
pub mod prefs;
pub mod remote;
pub mod rendering;
pub mod session;
pub mod stroke;
pub mod toolbar;

pub use annotation::{AnnotationLayer, InputEvent, Phase, Tool};
pub use history::DocumentHistory;
pub use session::{EditSession, SessionState, SubmitOutcome};
pub use stroke::{Path, Sample, StrokeOptions};

/// Configuration for an edit session
///
/// The defaults match the original editor: an 8px brush with moderate
/// thinning, smoothing and streamlining, captures bounded to 1000px at JPEG
/// quality 60, and a light dimming tint behind the strokes.
///
/// # Examples
///
/// ```
/// let cfg = drawover::SessionConfig::default();
/// assert_eq!(cfg.capture.max_edge, 1000);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Edit service endpoint receiving the JSON request
    pub endpoint: String,
    /// User agent sent with edit requests
    pub user_agent: String,
    /// Request timeout in milliseconds (0 => no timeout)
    pub timeout_ms: u64,
    /// Size of the annotated viewport
    pub viewport: Viewport,
    /// Brush parameters for every stroke
    pub stroke: StrokeOptions,
    /// Capture bounds and compression
    pub capture: capture::CaptureSettings,
    /// Responses with less trimmed markup than this are rejected
    pub min_response_len: usize,
    /// Tint under the strokes while annotating (`None` disables it)
    pub backdrop: Option<rendering::Rgba>,
    /// Where UI preferences are persisted (`None` keeps them in memory)
    pub preferences_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/refactor".to_string(),
            user_agent: format!("drawover/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 120_000,
            viewport: Viewport::default(),
            stroke: StrokeOptions::default(),
            capture: capture::CaptureSettings::default(),
            min_response_len: 10,
            backdrop: Some([0, 0, 0, 38]),
            preferences_path: None,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<FsPath>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::Config("viewport must be non-empty".into()));
        }
        if !(self.stroke.size > 0.0) {
            return Err(Error::Config(format!("stroke size must be positive, got {}", self.stroke.size)));
        }
        if !(1..=100).contains(&self.capture.quality) {
            return Err(Error::Config(format!(
                "capture quality must be within 1..=100, got {}",
                self.capture.quality
            )));
        }
        if self.capture.max_edge == 0 {
            return Err(Error::Config("capture max_edge must be positive".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
