//! Capture service: rasterize a screen region and encode it for transport.
//!
//! Regions are reached through injected [`CaptureTarget`] handles rather
//! than looked up globally. A target returns a raw RGBA raster for the
//! [`CaptureScene`] it is given; [`Capturer`] bounds its long edge and
//! encodes it as a lossy JPEG data URI.

use crate::rendering::{self, PaintCommand};
use crate::{Error, Result, Viewport};
use base64::Engine as Base64Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};

/// What a target should rasterize
#[derive(Debug, Clone, Copy)]
pub struct CaptureScene<'a> {
    pub viewport: Viewport,
    /// Overlay paint commands; `None` when the overlay is hidden
    pub overlay: Option<&'a [PaintCommand]>,
}

/// A screen region that can be rasterized at call time
pub trait CaptureTarget: Send + Sync {
    /// Rasterize the region as it is rendered right now
    fn rasterize(&self, scene: &CaptureScene<'_>) -> Result<RgbaImage>;
}

impl<F> CaptureTarget for F
where
    F: Fn(&CaptureScene<'_>) -> Result<RgbaImage> + Send + Sync,
{
    fn rasterize(&self, scene: &CaptureScene<'_>) -> Result<RgbaImage> {
        self(scene)
    }
}

/// Composites the overlay (when present) over a fixed page image.
///
/// Without a page image the background is opaque white at viewport size.
#[derive(Debug, Clone, Default)]
pub struct CanvasTarget {
    page: Option<RgbaImage>,
}

impl CanvasTarget {
    pub fn new(page: Option<RgbaImage>) -> Self {
        Self { page }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref())
            .map_err(|e| Error::Capture(format!("failed to open {}: {}", path.as_ref().display(), e)))?;
        Ok(Self::new(Some(img.to_rgba8())))
    }
}

impl CaptureTarget for CanvasTarget {
    fn rasterize(&self, scene: &CaptureScene<'_>) -> Result<RgbaImage> {
        let mut img = match &self.page {
            Some(page) => page.clone(),
            None => RgbaImage::from_pixel(
                scene.viewport.width,
                scene.viewport.height,
                Rgba([255, 255, 255, 255]),
            ),
        };
        if let Some(commands) = scene.overlay {
            rendering::rasterize_onto(&mut img, commands);
        }
        Ok(img)
    }
}

/// Returns a fixed page image regardless of the overlay.
///
/// Stands in for the clean page region when a screenshot is already on disk.
#[derive(Debug, Clone)]
pub struct StaticImageTarget {
    image: RgbaImage,
}

impl StaticImageTarget {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref())
            .map_err(|e| Error::Capture(format!("failed to open {}: {}", path.as_ref().display(), e)))?;
        Ok(Self::new(img.to_rgba8()))
    }
}

impl CaptureTarget for StaticImageTarget {
    fn rasterize(&self, _scene: &CaptureScene<'_>) -> Result<RgbaImage> {
        Ok(self.image.clone())
    }
}

/// Bounds and compression applied to every capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Longest allowed edge in pixels; larger rasters are downscaled
    pub max_edge: u32,
    /// JPEG quality, 1..=100
    pub quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_edge: 1000,
            quality: 60,
        }
    }
}

/// A compressed raster ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, &self.bytes);
        format!("data:{};base64,{}", self.mime, b64)
    }
}

/// Parse a base64 data URI back into bytes and mime type
pub fn decode_data_uri(uri: &str) -> Result<EncodedImage> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Encode("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Encode("data URI has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Encode("only base64 data URIs are supported".into()))?;
    let bytes = Base64Engine::decode(&base64::engine::general_purpose::STANDARD, payload)
        .map_err(|e| Error::Encode(format!("invalid base64 payload: {}", e)))?;
    Ok(EncodedImage {
        mime: mime.to_string(),
        bytes,
    })
}

/// Dimensions that fit `(w, h)` inside `max_edge` without enlarging
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let long = width.max(height);
    if max_edge == 0 || long <= max_edge {
        return (width, height);
    }
    let scale = max_edge as f64 / long as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Bounded JPEG encoder for capture targets
#[derive(Debug, Clone, Copy, Default)]
pub struct Capturer {
    settings: CaptureSettings,
}

impl Capturer {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    /// Rasterize `target` and encode the result
    pub fn capture(&self, target: &dyn CaptureTarget, scene: &CaptureScene<'_>) -> Result<EncodedImage> {
        let raster = target.rasterize(scene)?;
        self.encode(&raster)
    }

    /// Downscale to the configured bound, flatten onto white and JPEG-encode
    pub fn encode(&self, raster: &RgbaImage) -> Result<EncodedImage> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(Error::Capture("captured region is empty".into()));
        }

        let (w, h) = fit_within(raster.width(), raster.height(), self.settings.max_edge);
        let resized;
        let source = if (w, h) != raster.dimensions() {
            resized = image::imageops::resize(raster, w, h, FilterType::Triangle);
            &resized
        } else {
            raster
        };

        let rgb = flatten_on_white(source);
        let quality = self.settings.quality.clamp(1, 100);
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality).encode(
            rgb.as_raw(),
            w,
            h,
            image::ColorType::Rgb8,
        )?;

        debug!(
            "encoded {}x{} capture as {}x{} jpeg ({} bytes, q={})",
            raster.width(),
            raster.height(),
            w,
            h,
            bytes.len(),
            quality
        );

        Ok(EncodedImage {
            mime: "image/jpeg".to_string(),
            bytes,
        })
    }
}

fn flatten_on_white(img: &RgbaImage) -> image::RgbImage {
    image::RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let a = a as u32;
        let mix = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([mix(r), mix(g), mix(b)])
    })
}
