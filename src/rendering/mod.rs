//! Overlay rendering: paint commands, a software rasterizer, and SVG output.

pub mod paint;
pub mod raster;
pub mod svg;

pub use paint::{PaintCommand, Rgba};
pub use raster::{rasterize, rasterize_onto};
pub use svg::overlay_svg;
