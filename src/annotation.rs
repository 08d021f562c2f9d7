//! Annotation layer: the state machine that turns input events into strokes.
//!
//! The layer owns every committed stroke and the single in-progress stroke.
//! Input arrives as discrete [`InputEvent`] messages, either handled directly
//! with [`AnnotationLayer::handle`] or queued with [`AnnotationLayer::enqueue`]
//! and consumed in arrival order by [`AnnotationLayer::pump`]. Stroke shape
//! depends on sample order, so the queue is strictly FIFO.
//!
//! Every change to what the overlay shows invokes the registered render
//! handler with an [`OverlayFrame`].

use crate::rendering::{self, PaintCommand, Rgba};
use crate::stroke::{Path, Sample, StrokeOptions, StrokeRecorder};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type OnRenderHandler = Arc<dyn Fn(&OverlayFrame<'_>) + Send + Sync>;

/// Bit of `PointerEvent.buttons` for the primary button
pub const PRIMARY_BUTTON: u8 = 1;

/// Semantic action a stroke represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Tool {
    /// Add or change content where the stroke is drawn
    #[default]
    Modify,
    /// Remove content under the stroke
    Erase,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Modify => "modify",
            Tool::Erase => "erase",
        }
    }

    /// Fill color used when the stroke is rendered and captured
    pub fn color(self) -> Rgba {
        match self {
            Tool::Modify => [255, 0, 0, 255],
            Tool::Erase => [37, 99, 235, 255],
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modify" => Ok(Tool::Modify),
            "erase" => Ok(Tool::Erase),
            other => Err(crate::Error::Config(format!("unknown tool: {}", other))),
        }
    }
}

/// A discrete input message consumed by the layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Flip annotation mode on or off; always drops all ink
    Toggle,
    /// Leave annotation mode if it is on
    Escape,
    PointerDown(Sample),
    PointerMove {
        #[serde(flatten)]
        sample: Sample,
        /// `PointerEvent.buttons` bitmask
        #[serde(default = "primary_button")]
        buttons: u8,
    },
    PointerUp,
    /// Drop committed strokes, stay in annotation mode
    Clear,
    /// Leave annotation mode and drop all ink
    Discard,
    SetTool { tool: Tool },
    /// Remove the most recently committed stroke
    UndoStroke,
}

fn primary_button() -> u8 {
    PRIMARY_BUTTON
}

/// Observable state of the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ActiveEmpty,
    ActiveDrawing,
    ActiveHasStrokes,
}

/// A finalized stroke with its outline
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedStroke {
    samples: Vec<Sample>,
    tool: Tool,
    path: Path,
}

impl CommittedStroke {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What the overlay should currently show
pub struct OverlayFrame<'a> {
    pub visible: bool,
    pub strokes: &'a [CommittedStroke],
    pub live: Option<(Path, Tool)>,
    pub backdrop: Option<Rgba>,
}

impl OverlayFrame<'_> {
    /// Paint commands for this frame; empty when the overlay is hidden
    pub fn paint_commands(&self) -> Vec<PaintCommand> {
        if !self.visible {
            return Vec::new();
        }
        let mut cmds = Vec::with_capacity(self.strokes.len() + 2);
        if let Some(rgba) = self.backdrop {
            cmds.push(PaintCommand::Backdrop { rgba });
        }
        let live = self.live.as_ref().map(|(p, t)| (p, *t));
        for (path, tool) in self.strokes.iter().map(|s| (&s.path, s.tool)).chain(live) {
            if !path.is_empty() {
                cmds.push(PaintCommand::FillPath {
                    outline: path.outline().to_vec(),
                    rgba: tool.color(),
                });
            }
        }
        cmds
    }

    /// Standalone SVG for this frame; hidden frames render no paths
    pub fn to_svg(&self, width: u32, height: u32) -> String {
        if !self.visible {
            return rendering::overlay_svg(width, height, &[], None);
        }
        let live = self.live.as_ref().map(|(p, t)| (p, *t));
        rendering::overlay_svg(width, height, self.strokes, live)
    }
}

/// Annotation state machine
pub struct AnnotationLayer {
    options: StrokeOptions,
    strokes: Vec<CommittedStroke>,
    current: Option<StrokeRecorder>,
    active_tool: Tool,
    is_active: bool,
    hidden: bool,
    frozen: bool,
    backdrop: Option<Rgba>,
    queue: VecDeque<InputEvent>,
    on_render: Option<OnRenderHandler>,
}

impl fmt::Debug for AnnotationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationLayer")
            .field("phase", &self.phase())
            .field("strokes", &self.strokes.len())
            .field("active_tool", &self.active_tool)
            .field("hidden", &self.hidden)
            .field("frozen", &self.frozen)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Default for AnnotationLayer {
    fn default() -> Self {
        Self::new(StrokeOptions::default())
    }
}

impl AnnotationLayer {
    pub fn new(options: StrokeOptions) -> Self {
        Self {
            options,
            strokes: Vec::new(),
            current: None,
            active_tool: Tool::default(),
            is_active: false,
            hidden: false,
            frozen: false,
            backdrop: None,
            queue: VecDeque::new(),
            on_render: None,
        }
    }

    /// Tint drawn under the strokes while the overlay is visible
    pub fn with_backdrop(mut self, backdrop: Option<Rgba>) -> Self {
        self.backdrop = backdrop;
        self
    }

    /// Register a handler invoked after every change to the overlay
    pub fn on_render<F>(&mut self, cb: F)
    where
        F: Fn(&OverlayFrame<'_>) + Send + Sync + 'static,
    {
        self.on_render = Some(Arc::new(cb));
    }

    /// Remove the render handler if any
    pub fn clear_on_render(&mut self) {
        self.on_render = None;
    }

    pub fn phase(&self) -> Phase {
        if !self.is_active {
            Phase::Idle
        } else if self.current.is_some() {
            Phase::ActiveDrawing
        } else if self.strokes.is_empty() {
            Phase::ActiveEmpty
        } else {
            Phase::ActiveHasStrokes
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn strokes(&self) -> &[CommittedStroke] {
        &self.strokes
    }

    /// Samples of the in-progress stroke (empty unless drawing)
    pub fn current_samples(&self) -> &[Sample] {
        self.current.as_ref().map(|r| r.samples()).unwrap_or(&[])
    }

    /// Whether there is anything worth submitting: a committed stroke, or an
    /// in-progress one that would commit a visible path
    pub fn has_ink(&self) -> bool {
        !self.strokes.is_empty()
            || self
                .current
                .as_ref()
                .is_some_and(|r| !r.path().is_empty())
    }

    /// The frame currently shown
    pub fn frame(&self) -> OverlayFrame<'_> {
        OverlayFrame {
            visible: self.is_active && !self.hidden,
            strokes: &self.strokes,
            live: self
                .current
                .as_ref()
                .map(|r| (r.path(), self.active_tool))
                .filter(|(p, _)| !p.is_empty()),
            backdrop: self.backdrop,
        }
    }

    /// Queue an event for [`pump`](Self::pump)
    pub fn enqueue(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    /// Consume queued events in arrival order. Returns how many changed the
    /// layer.
    pub fn pump(&mut self) -> usize {
        let mut changed = 0;
        while let Some(event) = self.queue.pop_front() {
            if self.handle(event) {
                changed += 1;
            }
        }
        changed
    }

    /// Apply one event. Returns whether the layer changed.
    pub fn handle(&mut self, event: InputEvent) -> bool {
        if self.frozen {
            debug!("annotation layer frozen, dropping {:?}", event);
            return false;
        }
        trace!("annotation event {:?} in {:?}", event, self.phase());

        match event {
            InputEvent::Toggle => {
                self.drop_ink();
                self.is_active = !self.is_active;
                self.render();
                true
            }
            InputEvent::Escape => {
                if !self.is_active {
                    return false;
                }
                self.deactivate();
                true
            }
            InputEvent::PointerDown(sample) => {
                if !self.is_active || self.current.is_some() {
                    return false;
                }
                self.current = Some(StrokeRecorder::begin(self.options, sample));
                self.render();
                true
            }
            InputEvent::PointerMove { sample, buttons } => {
                let Some(current) = self.current.as_mut() else {
                    return false;
                };
                if buttons & PRIMARY_BUTTON == 0 {
                    // Missed pointer-up
                    self.finish_stroke();
                    return true;
                }
                current.push(sample);
                self.render();
                true
            }
            InputEvent::PointerUp => {
                if self.current.is_none() {
                    return false;
                }
                self.finish_stroke();
                true
            }
            InputEvent::Clear => {
                if !self.is_active || self.strokes.is_empty() {
                    return false;
                }
                self.strokes.clear();
                self.render();
                true
            }
            InputEvent::Discard => {
                if !self.is_active && !self.has_ink() {
                    return false;
                }
                self.deactivate();
                true
            }
            InputEvent::SetTool { tool } => {
                let changed = self.active_tool != tool;
                self.active_tool = tool;
                changed
            }
            InputEvent::UndoStroke => {
                if self.strokes.pop().is_none() {
                    return false;
                }
                self.render();
                true
            }
        }
    }

    /// Commit the in-progress stroke, if any, as though the pointer lifted
    pub fn commit_in_progress(&mut self) {
        if self.current.is_some() {
            self.finish_stroke();
        }
    }

    /// Stop accepting input while an edit is in flight. Ink is kept.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
        self.set_hidden(false);
    }

    /// Hide or show the overlay without touching the ink
    pub fn set_hidden(&mut self, hidden: bool) {
        if self.hidden != hidden {
            self.hidden = hidden;
            self.render();
        }
    }

    /// Back to `Idle` with no ink, no freeze and nothing queued
    pub fn reset(&mut self) {
        self.queue.clear();
        self.frozen = false;
        self.hidden = false;
        self.deactivate();
    }

    fn deactivate(&mut self) {
        self.drop_ink();
        self.is_active = false;
        self.render();
    }

    fn drop_ink(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    fn finish_stroke(&mut self) {
        if let Some(recorder) = self.current.take() {
            let (samples, path) = recorder.finish();
            if path.is_empty() {
                debug!("dropping stroke with {} sample(s), nothing to draw", samples.len());
            } else {
                self.strokes.push(CommittedStroke {
                    samples,
                    tool: self.active_tool,
                    path,
                });
            }
        }
        self.render();
    }

    fn render(&self) {
        if let Some(cb) = &self.on_render {
            cb(&self.frame());
        }
    }
}
