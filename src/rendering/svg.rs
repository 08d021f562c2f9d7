//! SVG serialization of the overlay, for display in a page or for debugging.

use crate::annotation::CommittedStroke;
use crate::rendering::paint::hex;
use crate::stroke::Path;
use crate::Tool;
use std::fmt::Write as _;

/// Render committed strokes plus an optional live path as a standalone SVG
/// document sized to the viewport.
pub fn overlay_svg(
    width: u32,
    height: u32,
    strokes: &[CommittedStroke],
    live: Option<(&Path, Tool)>,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    for stroke in strokes {
        push_path(&mut out, stroke.path(), stroke.tool());
    }
    if let Some((path, tool)) = live {
        push_path(&mut out, path, tool);
    }
    out.push_str("</svg>");
    out
}

fn push_path(out: &mut String, path: &Path, tool: Tool) {
    if path.is_empty() {
        return;
    }
    let _ = write!(
        out,
        r#"<path d="{}" fill="{}" data-tool="{}"/>"#,
        path.to_svg_data(),
        hex(tool.color()),
        tool.name()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{get_stroke, Sample, StrokeOptions};

    #[test]
    fn empty_overlay_is_bare_svg() {
        let svg = overlay_svg(100, 50, &[], None);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn live_path_is_tagged_with_tool() {
        let samples = [
            Sample::new(0.0, 0.0, 0.5),
            Sample::new(20.0, 10.0, 0.5),
            Sample::new(40.0, 10.0, 0.5),
        ];
        let path = get_stroke(&samples, &StrokeOptions::default());
        let svg = overlay_svg(100, 50, &[], Some((&path, Tool::Erase)));
        assert!(svg.contains(r#"data-tool="erase""#));
        assert!(svg.contains(r##"fill="#2563eb""##));
    }
}
