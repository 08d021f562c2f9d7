/// Toolbar visibility policy for the annotation controls

use crate::annotation::AnnotationLayer;
use crate::Viewport;

/// Distance from the bottom edge inside which a drawing pointer pushes the
/// toolbar away
pub const DEFAULT_RETRACT_MARGIN: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarPlacement {
    /// Not in annotation mode, or an edit is in flight
    Hidden,
    Shown,
    /// Moved out from under the pointer and not interactive
    Retracted,
}

#[derive(Debug, Clone, Copy)]
pub struct Toolbar {
    retract_margin: f64,
}

impl Default for Toolbar {
    fn default() -> Self {
        Self {
            retract_margin: DEFAULT_RETRACT_MARGIN,
        }
    }
}

impl Toolbar {
    pub fn new(retract_margin: f64) -> Self {
        Self { retract_margin }
    }

    pub fn placement(&self, layer: &AnnotationLayer, pointer_y: Option<f64>, viewport: Viewport) -> ToolbarPlacement {
        if !layer.is_active() || layer.is_frozen() {
            return ToolbarPlacement::Hidden;
        }
        let near_bottom = pointer_y
            .map(|y| viewport.height as f64 - y < self.retract_margin)
            .unwrap_or(false);
        if layer.is_drawing() && near_bottom {
            ToolbarPlacement::Retracted
        } else {
            ToolbarPlacement::Shown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InputEvent, Sample};

    const VP: Viewport = Viewport { width: 800, height: 600 };

    #[test]
    fn hidden_when_idle() {
        let layer = AnnotationLayer::default();
        assert_eq!(Toolbar::default().placement(&layer, Some(590.0), VP), ToolbarPlacement::Hidden);
    }

    #[test]
    fn retracts_only_while_drawing_near_bottom() {
        let mut layer = AnnotationLayer::default();
        layer.handle(InputEvent::Toggle);
        let tb = Toolbar::default();
        assert_eq!(tb.placement(&layer, Some(590.0), VP), ToolbarPlacement::Shown);

        layer.handle(InputEvent::PointerDown(Sample::new(10.0, 590.0, 0.5)));
        assert_eq!(tb.placement(&layer, Some(590.0), VP), ToolbarPlacement::Retracted);
        assert_eq!(tb.placement(&layer, Some(100.0), VP), ToolbarPlacement::Shown);
        assert_eq!(tb.placement(&layer, None, VP), ToolbarPlacement::Shown);
    }

    #[test]
    fn hidden_while_frozen() {
        let mut layer = AnnotationLayer::default();
        layer.handle(InputEvent::Toggle);
        layer.freeze();
        assert_eq!(Toolbar::new(50.0).placement(&layer, None, VP), ToolbarPlacement::Hidden);
    }
}
