/// Software rasterizer for overlay paint commands

use crate::rendering::paint::{PaintCommand, Rgba};
use crate::stroke::Point;
use image::{Rgba as Pixel, RgbaImage};

/// Vertical sub-scanlines per pixel row, for edge anti-aliasing
const SUBSAMPLES: u32 = 4;

/// Rasterize `commands` onto a transparent surface of the given size
pub fn rasterize(width: u32, height: u32, commands: &[PaintCommand]) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, Pixel([0, 0, 0, 0]));
    rasterize_onto(&mut img, commands);
    img
}

/// Composite `commands`, in order, over an existing image
pub fn rasterize_onto(img: &mut RgbaImage, commands: &[PaintCommand]) {
    for cmd in commands {
        match cmd {
            PaintCommand::Backdrop { rgba } => {
                for px in img.pixels_mut() {
                    blend(px, *rgba, 1.0);
                }
            }
            PaintCommand::FillPath { outline, rgba } => fill_polygon(img, outline, *rgba),
        }
    }
}

fn fill_polygon(img: &mut RgbaImage, outline: &[Point], rgba: Rgba) {
    if outline.len() < 3 || img.width() == 0 || img.height() == 0 {
        return;
    }

    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in outline {
        min_y = min_y.min(p[1]);
        max_y = max_y.max(p[1]);
    }
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }

    let width = img.width() as usize;
    let row_start = min_y.floor().max(0.0) as u32;
    let row_end = (max_y.ceil().max(0.0) as u32).min(img.height());

    let mut coverage = vec![0.0f64; width];
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for row in row_start..row_end {
        coverage.iter_mut().for_each(|c| *c = 0.0);
        let mut touched = false;

        for sub in 0..SUBSAMPLES {
            let sy = row as f64 + (sub as f64 + 0.5) / SUBSAMPLES as f64;
            crossings.clear();
            for (i, a) in outline.iter().enumerate() {
                let b = outline[(i + 1) % outline.len()];
                let (y0, y1) = (a[1], b[1]);
                if (y0 <= sy && y1 > sy) || (y1 <= sy && y0 > sy) {
                    let t = (sy - y0) / (y1 - y0);
                    let x = a[0] + t * (b[0] - a[0]);
                    crossings.push((x, if y1 > y0 { 1 } else { -1 }));
                }
            }
            if crossings.is_empty() {
                continue;
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                // Pixels whose centers fall inside [x0, x1)
                let x0 = (pair[0].0 - 0.5).ceil().max(0.0);
                let x1 = (pair[1].0 - 0.5).ceil().min(width as f64);
                if x1 <= x0 {
                    continue;
                }
                for c in &mut coverage[x0 as usize..x1 as usize] {
                    *c += 1.0 / SUBSAMPLES as f64;
                }
                touched = true;
            }
        }

        if !touched {
            continue;
        }
        for (x, c) in coverage.iter().enumerate() {
            if *c > 0.0 {
                blend(img.get_pixel_mut(x as u32, row), rgba, c.min(1.0));
            }
        }
    }
}

/// Source-over blend of `src` scaled by `coverage` onto `dst`
fn blend(dst: &mut Pixel<u8>, src: Rgba, coverage: f64) {
    let sa = src[3] as f64 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f64 / 255.0;
        let d = dst.0[c] as f64 / 255.0;
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst.0[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, s: f64) -> Vec<Point> {
        vec![[x, y], [x + s, y], [x + s, y + s], [x, y + s]]
    }

    #[test]
    fn fills_square_interior() {
        let cmds = vec![PaintCommand::FillPath {
            outline: square(2.0, 2.0, 4.0),
            rgba: [255, 0, 0, 255],
        }];
        let img = rasterize(10, 10, &cmds);
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(8, 8).0[3], 0);
    }

    #[test]
    fn backdrop_tints_every_pixel() {
        let mut img = RgbaImage::from_pixel(4, 4, Pixel([255, 255, 255, 255]));
        rasterize_onto(&mut img, &[PaintCommand::Backdrop { rgba: [0, 0, 0, 38] }]);
        let px = img.get_pixel(1, 1).0;
        assert!(px[0] < 255 && px[0] > 200);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn out_of_bounds_polygon_is_clipped() {
        let cmds = vec![PaintCommand::FillPath {
            outline: square(-50.0, -50.0, 200.0),
            rgba: [0, 0, 255, 255],
        }];
        let img = rasterize(8, 8, &cmds);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn degenerate_outline_draws_nothing() {
        let cmds = vec![PaintCommand::FillPath {
            outline: vec![[1.0, 1.0], [3.0, 3.0]],
            rgba: [255, 0, 0, 255],
        }];
        let img = rasterize(5, 5, &cmds);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }
}
