//! Thumbnail compositor.
//!
//! This module turns a decoded frame into the final JPEG thumbnail on a fixed
//! output canvas.
//!
//! # Design Decisions
//!
//! - **Fixed canvas**: every thumbnail has exactly the configured output
//!   dimensions, whatever the source geometry.
//!
//! - **Conditional letterbox**: frames whose aspect ratio matches the canvas
//!   are scaled directly. Anything else is fitted inside the canvas and padded
//!   on the short axis, so sources are never stretched.
//!
//! - **Dominant color padding**: the padding is the mean color of the frame
//!   rather than a fixed black bar.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::ThumbnailError;
use crate::media::FrameSample;

/// Default output width in pixels.
pub const DEFAULT_OUTPUT_WIDTH: u32 = 640;

/// Default output height in pixels.
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 360;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Two aspect ratios closer than this are treated as equal.
pub const ASPECT_TOLERANCE: f64 = 0.01;

// =============================================================================
// Output Geometry
// =============================================================================

/// Canonical output geometry shared by every thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,
}

impl OutputSpec {
    /// Create an output spec with the given canvas size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Canvas width divided by height.
    pub fn target_aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_WIDTH, DEFAULT_OUTPUT_HEIGHT)
    }
}

/// How a frame was placed onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Pure scale to the canvas size, no padding
    Resize,

    /// Scaled to fit and centered on a dominant-color background
    Letterbox {
        /// Size of the scaled frame
        scaled_width: u32,
        scaled_height: u32,
        /// Top-left corner of the scaled frame on the canvas
        offset_x: u32,
        offset_y: u32,
        /// Padding color
        background: [u8; 3],
    },
}

// =============================================================================
// Compositor
// =============================================================================

/// Resizes or letterboxes frames onto the output canvas and encodes JPEG.
///
/// # Example
///
/// ```ignore
/// use video_thumbnailer::thumbnail::{Compositor, OutputSpec};
///
/// let compositor = Compositor::new(OutputSpec::new(640, 360), 80);
/// let jpeg = compositor.compose(frame)?;
/// ```
#[derive(Debug, Clone)]
pub struct Compositor {
    spec: OutputSpec,
    quality: u8,
}

impl Compositor {
    /// Create a compositor for the given canvas and JPEG quality.
    ///
    /// Quality is clamped to 1-100.
    pub fn new(spec: OutputSpec, quality: u8) -> Self {
        Self {
            spec,
            quality: clamp_quality(quality),
        }
    }

    /// The output geometry.
    pub fn spec(&self) -> OutputSpec {
        self.spec
    }

    /// The JPEG quality used for encoding.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decide how a frame of the given size is placed on the canvas.
    ///
    /// `background` is only computed when the frame needs letterboxing.
    pub fn placement(&self, frame: &RgbImage) -> Placement {
        let (width, height) = frame.dimensions();
        let source_aspect = width as f64 / height as f64;

        if (source_aspect - self.spec.target_aspect_ratio()).abs() <= ASPECT_TOLERANCE {
            return Placement::Resize;
        }

        let (scaled_width, scaled_height) = fit_within(width, height, self.spec);
        Placement::Letterbox {
            scaled_width,
            scaled_height,
            offset_x: (self.spec.width - scaled_width) / 2,
            offset_y: (self.spec.height - scaled_height) / 2,
            background: dominant_color(frame),
        }
    }

    /// Composite a frame onto the canvas without encoding.
    pub fn render(&self, frame: FrameSample) -> Result<RgbImage, ThumbnailError> {
        let image = frame.into_image()?;

        let canvas = match self.placement(&image) {
            Placement::Resize => imageops::resize(
                &image,
                self.spec.width,
                self.spec.height,
                FilterType::Triangle,
            ),
            Placement::Letterbox {
                scaled_width,
                scaled_height,
                offset_x,
                offset_y,
                background,
            } => {
                let scaled =
                    imageops::resize(&image, scaled_width, scaled_height, FilterType::Triangle);
                let mut canvas =
                    RgbImage::from_pixel(self.spec.width, self.spec.height, Rgb(background));
                imageops::replace(&mut canvas, &scaled, offset_x as i64, offset_y as i64);
                canvas
            }
        };

        Ok(canvas)
    }

    /// Composite a frame and encode it as JPEG.
    ///
    /// # Errors
    ///
    /// Returns a transform error if the frame buffer is inconsistent or JPEG
    /// encoding fails.
    pub fn compose(&self, frame: FrameSample) -> Result<Bytes, ThumbnailError> {
        let canvas = self.render(frame)?;

        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
        encoder
            .encode_image(&canvas)
            .map_err(|e| ThumbnailError::transform(format!("failed to encode JPEG: {}", e)))?;

        Ok(Bytes::from(output))
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(OutputSpec::default(), DEFAULT_JPEG_QUALITY)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Largest size with the frame's aspect ratio that fits inside the canvas.
///
/// Each side is at least one pixel and never exceeds the canvas.
pub fn fit_within(width: u32, height: u32, spec: OutputSpec) -> (u32, u32) {
    let scale = f64::min(
        spec.width as f64 / width as f64,
        spec.height as f64 / height as f64,
    );

    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, spec.width);
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, spec.height);
    (scaled_width, scaled_height)
}

/// Mean RGB color over every pixel of the image.
pub fn dominant_color(image: &RgbImage) -> [u8; 3] {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return [0, 0, 0];
    }

    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += channel as u64;
        }
    }

    sums.map(|sum| ((sum + count / 2) / count) as u8)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
