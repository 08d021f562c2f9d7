/// Paint command set for the annotation overlay

use crate::stroke::Point;

/// Straight (non-premultiplied) RGBA color
pub type Rgba = [u8; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    /// Fill the whole surface; used for the dimming backdrop of an active overlay
    Backdrop { rgba: Rgba },
    /// Fill a closed outline with the non-zero winding rule
    FillPath { outline: Vec<Point>, rgba: Rgba },
}

impl PaintCommand {
    pub fn rgba(&self) -> Rgba {
        match self {
            PaintCommand::Backdrop { rgba } | PaintCommand::FillPath { rgba, .. } => *rgba,
        }
    }
}

/// `#rrggbb` form of a color, ignoring alpha
pub fn hex(rgba: Rgba) -> String {
    format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])
}
