//! Stroke recorder: turns pointer samples into a smoothed, variable-width
//! outline polygon.
//!
//! The outline is built in two passes. The first pass streamlines the raw
//! samples (exponential smoothing toward the input) and annotates each point
//! with its direction and running length. The second pass walks those points
//! and offsets them to the left and right by a pressure-dependent radius,
//! rounding sharp corners and both end caps.
//!
//! Every function here is pure: the same samples and options always produce
//! the same [`Path`], whether the sequence is still growing or finalized.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Write as _;

/// A 2D point in page coordinates
pub type Point = [f64; 2];

const RATE_OF_PRESSURE_CHANGE: f64 = 0.275;
const FIXED_PI: f64 = PI + 0.0001;
const MIN_RADIUS_FACTOR: f64 = 0.01;
const MIN_RADIUS: f64 = 0.5;
const DEFAULT_PRESSURE: f64 = 0.5;

/// A single pointer observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_pressure")]
    pub pressure: f64,
}

fn default_pressure() -> f64 {
    DEFAULT_PRESSURE
}

impl Sample {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }

    fn point(&self) -> Point {
        [self.x, self.y]
    }

    /// Pressure clamped to `[0, 1]`; NaN reads as zero
    fn clamped_pressure(&self) -> f64 {
        if self.pressure.is_nan() {
            0.0
        } else {
            self.pressure.clamp(0.0, 1.0)
        }
    }
}

/// Parameters of the smoothing function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeOptions {
    /// Base diameter of the brush
    pub size: f64,
    /// How much pressure affects the width, in `[-1, 1]`
    pub thinning: f64,
    /// How much to soften the outline edges, in `[0, 1]`
    pub smoothing: f64,
    /// How much to damp input jitter, in `[0, 1]`
    pub streamline: f64,
    /// Derive pressure from pointer velocity instead of the sample values.
    /// Mouse input (all pressures 0 or 0.5) is always simulated.
    pub simulate_pressure: bool,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            size: 8.0,
            thinning: 0.5,
            smoothing: 0.5,
            streamline: 0.5,
            simulate_pressure: false,
        }
    }
}

/// The renderable outline of a stroke
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    outline: Vec<Point>,
}

impl Path {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.outline.is_empty()
    }

    /// Outline polygon vertices, in drawing order
    pub fn outline(&self) -> &[Point] {
        &self.outline
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty path
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.outline.first()?;
        Some(self.outline.iter().fold((first, first), |(lo, hi), p| {
            ([lo[0].min(p[0]), lo[1].min(p[1])], [hi[0].max(p[0]), hi[1].max(p[1])])
        }))
    }

    /// SVG path data: quadratic curves through the midpoints of successive
    /// outline vertices, closed with `Z`. Empty for an empty path.
    pub fn to_svg_data(&self) -> String {
        let Some(first) = self.outline.first() else {
            return String::new();
        };
        let mut d = String::with_capacity(self.outline.len() * 32);
        let _ = write!(d, "M {:.2} {:.2} Q", first[0], first[1]);
        let n = self.outline.len();
        for (i, p) in self.outline.iter().enumerate() {
            let next = self.outline[(i + 1) % n];
            let _ = write!(
                d,
                " {:.2} {:.2} {:.2} {:.2}",
                p[0],
                p[1],
                (p[0] + next[0]) / 2.0,
                (p[1] + next[1]) / 2.0
            );
        }
        d.push_str(" Z");
        d
    }
}

/// Accumulates samples for one in-progress stroke
#[derive(Debug, Clone, Default)]
pub struct StrokeRecorder {
    samples: Vec<Sample>,
    options: StrokeOptions,
}

impl StrokeRecorder {
    pub fn new(options: StrokeOptions) -> Self {
        Self {
            samples: Vec::new(),
            options,
        }
    }

    /// Start a new sequence seeded with `first`
    pub fn begin(options: StrokeOptions, first: Sample) -> Self {
        Self {
            samples: vec![first],
            options,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Live preview of the outline for the samples recorded so far
    pub fn path(&self) -> Path {
        get_stroke(&self.samples, &self.options)
    }

    /// Consume the recorder, returning the samples and their final outline
    pub fn finish(self) -> (Vec<Sample>, Path) {
        let path = get_stroke(&self.samples, &self.options);
        (self.samples, path)
    }
}

#[derive(Debug, Clone, Copy)]
struct StrokePoint {
    point: Point,
    pressure: f64,
    vector: Point,
    distance: f64,
    running_length: f64,
}

/// Compute the outline for `samples`. Fewer than two samples, or a
/// non-positive size, yields an empty path.
pub fn get_stroke(samples: &[Sample], options: &StrokeOptions) -> Path {
    if samples.len() < 2 || !(options.size > 0.0) {
        return Path::empty();
    }
    let simulate = options.simulate_pressure || is_mouse_input(samples);
    let points = stroke_points(samples, options);
    Path {
        outline: outline_points(&points, options, simulate),
    }
}

/// Mouse pointers report 0.5 while a button is held and 0 otherwise
fn is_mouse_input(samples: &[Sample]) -> bool {
    samples
        .iter()
        .all(|s| s.pressure == 0.5 || s.pressure == 0.0)
}

fn stroke_points(samples: &[Sample], options: &StrokeOptions) -> Vec<StrokePoint> {
    let streamline = options.streamline.clamp(0.0, 1.0);
    let t = 0.15 + (1.0 - streamline) * 0.85;

    let mut pts: Vec<(Point, f64)> = samples
        .iter()
        .map(|s| (s.point(), s.clamped_pressure()))
        .collect();

    // Interpolate a two-sample input so it does not render as a dash.
    // Inserted points carry the default pressure.
    if pts.len() == 2 {
        let (last, _) = pts[1];
        pts.truncate(1);
        for i in 1..5 {
            pts.push((lrp(pts[0].0, last, i as f64 / 4.0), DEFAULT_PRESSURE));
        }
    }

    let mut out = vec![StrokePoint {
        point: pts[0].0,
        pressure: pts[0].1,
        vector: [1.0, 1.0],
        distance: 0.0,
        running_length: 0.0,
    }];

    let mut reached_min_length = false;
    let mut running_length = 0.0;
    let mut prev = out[0];
    let max = pts.len() - 1;

    for (i, &(raw, pressure)) in pts.iter().enumerate().skip(1) {
        let point = lrp(prev.point, raw, t);
        if prev.point == point {
            continue;
        }
        let distance = dist(point, prev.point);
        running_length += distance;
        if i < max && !reached_min_length {
            if running_length < options.size {
                continue;
            }
            reached_min_length = true;
        }
        prev = StrokePoint {
            point,
            pressure,
            vector: uni(sub(prev.point, point)),
            distance,
            running_length,
        };
        out.push(prev);
    }

    out[0].vector = out.get(1).map(|p| p.vector).unwrap_or([0.0, 0.0]);
    out
}

fn stroke_radius(size: f64, thinning: f64, pressure: f64) -> f64 {
    size * (0.5 - thinning * (0.5 - pressure))
}

fn simulated_pressure(prev: f64, distance: f64, size: f64) -> f64 {
    let sp = (distance / size).min(1.0);
    let rp = (1.0 - sp).min(1.0);
    (prev + (rp - prev) * (sp * RATE_OF_PRESSURE_CHANGE)).min(1.0)
}

fn outline_points(points: &[StrokePoint], options: &StrokeOptions, simulate: bool) -> Vec<Point> {
    let size = options.size;
    let thinning = options.thinning.clamp(-1.0, 1.0);
    let min_radius = (size * MIN_RADIUS_FACTOR).max(MIN_RADIUS);
    let min_distance = (size * options.smoothing.clamp(0.0, 1.0)).powi(2);
    let last = points.len() - 1;
    let total_length = points[last].running_length;

    let mut prev_pressure = points.iter().take(10).fold(points[0].pressure, |acc, p| {
        let pressure = if simulate {
            simulated_pressure(acc, p.distance, size)
        } else {
            p.pressure
        };
        (acc + pressure) / 2.0
    });

    let mut radius = stroke_radius(size, thinning, points[last].pressure).max(min_radius);
    let mut first_radius: Option<f64> = None;
    let mut prev_vector = points[0].vector;
    let mut pl = points[0].point;
    let mut pr = pl;
    let mut tl = pl;
    let mut tr = pr;
    let mut prev_sharp = false;

    let mut left: Vec<Point> = Vec::with_capacity(points.len() + 16);
    let mut right: Vec<Point> = Vec::with_capacity(points.len() + 16);

    for (i, sp) in points.iter().enumerate() {
        if i < last && total_length - sp.running_length < 3.0 {
            continue;
        }

        let mut pressure = sp.pressure;
        radius = if thinning != 0.0 {
            if simulate {
                pressure = simulated_pressure(prev_pressure, sp.distance, size);
            }
            stroke_radius(size, thinning, pressure)
        } else {
            size / 2.0
        };
        radius = radius.max(min_radius);
        first_radius.get_or_insert(radius);

        let next_vector = points.get(i + 1).unwrap_or(sp).vector;
        let next_dpr = if i < last { dpr(sp.vector, next_vector) } else { 1.0 };
        let prev_dpr = dpr(sp.vector, prev_vector);
        let sharp = prev_dpr < 0.0 && !prev_sharp;
        let next_sharp = next_dpr < 0.0;

        if sharp || next_sharp {
            let offset = mul(per(prev_vector), radius);
            let step = 1.0 / 13.0;
            let mut t = 0.0;
            while t <= 1.0 {
                tl = rot_around(sub(sp.point, offset), sp.point, FIXED_PI * t);
                left.push(tl);
                tr = rot_around(add(sp.point, offset), sp.point, FIXED_PI * -t);
                right.push(tr);
                t += step;
            }
            pl = tl;
            pr = tr;
            if next_sharp {
                prev_sharp = true;
            }
            continue;
        }
        prev_sharp = false;

        if i == last {
            let offset = mul(per(sp.vector), radius);
            left.push(sub(sp.point, offset));
            right.push(add(sp.point, offset));
            continue;
        }

        let offset = mul(per(lrp(next_vector, sp.vector, next_dpr)), radius);
        tl = sub(sp.point, offset);
        if i <= 1 || dist2(pl, tl) > min_distance {
            left.push(tl);
            pl = tl;
        }
        tr = add(sp.point, offset);
        if i <= 1 || dist2(pr, tr) > min_distance {
            right.push(tr);
            pr = tr;
        }

        prev_pressure = pressure;
        prev_vector = sp.vector;
    }

    let first_point = points[0].point;

    if points.len() == 1 {
        // Every sample collapsed onto one point: draw a dot
        let last_point = add(first_point, [1.0, 1.0]);
        let r = first_radius.unwrap_or(radius);
        let start = prj(first_point, uni(per(sub(first_point, last_point))), -r);
        let step = 1.0 / 13.0;
        let mut dot = Vec::with_capacity(14);
        let mut t = step;
        while t <= 1.0 {
            dot.push(rot_around(start, first_point, FIXED_PI * 2.0 * t));
            t += step;
        }
        return dot;
    }

    let last_point = points[last].point;

    let mut start_cap = Vec::with_capacity(13);
    if let Some(&anchor) = right.first() {
        let step = 1.0 / 13.0;
        let mut t = step;
        while t <= 1.0 {
            start_cap.push(rot_around(anchor, first_point, FIXED_PI * t));
            t += step;
        }
    }

    let direction = per(neg(points[last].vector));
    let mut end_cap = Vec::with_capacity(29);
    let start = prj(last_point, direction, radius);
    let step = 1.0 / 29.0;
    let mut t = step;
    while t < 1.0 {
        end_cap.push(rot_around(start, last_point, FIXED_PI * 3.0 * t));
        t += step;
    }

    let mut outline = left;
    outline.extend(end_cap);
    outline.extend(right.into_iter().rev());
    outline.extend(start_cap);
    outline
}

fn add(a: Point, b: Point) -> Point {
    [a[0] + b[0], a[1] + b[1]]
}

fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

fn mul(a: Point, n: f64) -> Point {
    [a[0] * n, a[1] * n]
}

fn neg(a: Point) -> Point {
    [-a[0], -a[1]]
}

fn per(a: Point) -> Point {
    [a[1], -a[0]]
}

fn dpr(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn len(a: Point) -> f64 {
    a[0].hypot(a[1])
}

fn uni(a: Point) -> Point {
    let l = len(a);
    if l == 0.0 {
        [0.0, 0.0]
    } else {
        [a[0] / l, a[1] / l]
    }
}

fn dist(a: Point, b: Point) -> f64 {
    len(sub(a, b))
}

fn dist2(a: Point, b: Point) -> f64 {
    let d = sub(a, b);
    d[0] * d[0] + d[1] * d[1]
}

fn lrp(a: Point, b: Point, t: f64) -> Point {
    add(a, mul(sub(b, a), t))
}

fn prj(a: Point, b: Point, c: f64) -> Point {
    add(a, mul(b, c))
}

fn rot_around(a: Point, c: Point, r: f64) -> Point {
    let (s, co) = r.sin_cos();
    let px = a[0] - c[0];
    let py = a[1] - c[1];
    [px * co - py * s + c[0], px * s + py * co + c[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, pressure: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(10.0 + i as f64 * 6.0, 20.0 + (i as f64 * 0.7).sin() * 4.0, pressure))
            .collect()
    }

    #[test]
    fn empty_and_single_sample_yield_empty_path() {
        let opts = StrokeOptions::default();
        assert!(get_stroke(&[], &opts).is_empty());
        assert!(get_stroke(&[Sample::new(1.0, 1.0, 0.5)], &opts).is_empty());
        assert_eq!(get_stroke(&[], &opts).to_svg_data(), "");
    }

    #[test]
    fn smoothing_is_idempotent() {
        let opts = StrokeOptions::default();
        let samples = line(24, 0.7);
        let a = get_stroke(&samples, &opts);
        let b = get_stroke(&samples, &opts);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert_eq!(a.to_svg_data(), b.to_svg_data());
    }

    #[test]
    fn zero_pressure_produces_finite_outline() {
        let opts = StrokeOptions {
            thinning: 1.0,
            ..Default::default()
        };
        let samples: Vec<Sample> = line(12, 0.3)
            .into_iter()
            .map(|s| Sample { pressure: 0.0, ..s })
            .collect();
        let path = get_stroke(&samples, &opts);
        assert!(!path.is_empty());
        assert!(path.outline().iter().all(|p| p[0].is_finite() && p[1].is_finite()));
    }

    #[test]
    fn nan_pressure_is_tolerated() {
        let samples = vec![
            Sample::new(0.0, 0.0, f64::NAN),
            Sample::new(20.0, 0.0, f64::NAN),
            Sample::new(40.0, 5.0, f64::NAN),
        ];
        let path = get_stroke(&samples, &StrokeOptions::default());
        assert!(path.outline().iter().all(|p| p[0].is_finite() && p[1].is_finite()));
    }

    #[test]
    fn two_samples_render_a_stroke() {
        let samples = vec![Sample::new(0.0, 0.0, 0.5), Sample::new(30.0, 0.0, 0.5)];
        let path = get_stroke(&samples, &StrokeOptions::default());
        assert!(!path.is_empty());
        let (lo, hi) = path.bounds().unwrap();
        assert!(lo[0] < 1.0 && hi[0] > 20.0);
    }

    #[test]
    fn two_sample_interpolation_uses_default_pressure() {
        let opts = StrokeOptions::default();
        let pen = vec![Sample::new(0.0, 0.0, 1.0), Sample::new(40.0, 0.0, 1.0)];
        let expanded = vec![
            Sample::new(0.0, 0.0, 1.0),
            Sample::new(10.0, 0.0, 0.5),
            Sample::new(20.0, 0.0, 0.5),
            Sample::new(30.0, 0.0, 0.5),
            Sample::new(40.0, 0.0, 0.5),
        ];
        assert_eq!(get_stroke(&pen, &opts), get_stroke(&expanded, &opts));
    }

    #[test]
    fn identical_samples_render_a_dot() {
        let samples = vec![Sample::new(5.0, 5.0, 0.5); 4];
        let path = get_stroke(&samples, &StrokeOptions::default());
        assert!(!path.is_empty());
        let (lo, hi) = path.bounds().unwrap();
        assert!(hi[0] - lo[0] < 10.0 && hi[1] - lo[1] < 10.0);
    }

    #[test]
    fn width_follows_size() {
        let samples = vec![
            Sample::new(0.0, 50.0, 0.5),
            Sample::new(50.0, 50.0, 0.5),
            Sample::new(100.0, 50.0, 0.5),
            Sample::new(150.0, 50.0, 0.5),
        ];
        let thin = get_stroke(&samples, &StrokeOptions { size: 4.0, ..Default::default() });
        let thick = get_stroke(&samples, &StrokeOptions { size: 24.0, ..Default::default() });
        let height = |p: &Path| {
            let (lo, hi) = p.bounds().unwrap();
            hi[1] - lo[1]
        };
        assert!(height(&thick) > height(&thin));
    }

    #[test]
    fn growing_recorder_matches_batch() {
        let samples = line(16, 0.6);
        let opts = StrokeOptions::default();
        let mut rec = StrokeRecorder::begin(opts, samples[0]);
        for s in &samples[1..] {
            rec.push(*s);
            let _preview = rec.path();
        }
        let (recorded, path) = rec.finish();
        assert_eq!(recorded, samples);
        assert_eq!(path, get_stroke(&samples, &opts));
    }

    #[test]
    fn svg_data_is_closed_quadratic_path() {
        let path = get_stroke(&line(8, 0.5), &StrokeOptions::default());
        let d = path.to_svg_data();
        assert!(d.starts_with("M "));
        assert!(d.contains(" Q "));
        assert!(d.ends_with(" Z"));
    }
}
