//! Decoded frames and the trait that produces them.

use async_trait::async_trait;
use image::RgbImage;

use crate::error::ThumbnailError;

// =============================================================================
// FrameSample
// =============================================================================

/// A single decoded video frame.
///
/// Pixels are packed RGB8 in row-major order. A sample is produced by a
/// [`FrameSource`] and consumed immediately by the compositor.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl FrameSample {
    /// Create a frame from a packed RGB8 buffer.
    ///
    /// # Errors
    ///
    /// Returns a transform error if either dimension is zero or the buffer
    /// length does not equal `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, ThumbnailError> {
        if width == 0 || height == 0 {
            return Err(ThumbnailError::transform(format!(
                "frame has empty dimensions {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(ThumbnailError::transform(format!(
                "frame buffer holds {} bytes, expected {} for {}x{} RGB",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Create a frame from an already decoded RGB image.
    pub fn from_image(image: RgbImage) -> Result<Self, ThumbnailError> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw packed RGB8 pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Convert into an `image` buffer for compositing.
    pub fn into_image(self) -> Result<RgbImage, ThumbnailError> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| ThumbnailError::transform("frame buffer does not match dimensions"))
    }
}

// =============================================================================
// FrameSource Trait
// =============================================================================

/// Capability that extracts one representative frame from a video.
///
/// Implementations may block on network or process I/O for as long as the
/// decode takes; the dispatcher bounds how many run at once.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Extract a single decoded frame from the video at `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::UpstreamFetch`] when the source is unreachable
    /// or contains no usable video stream, and [`ThumbnailError::Transform`]
    /// when the extracted frame cannot be decoded.
    async fn extract_frame(&self, locator: &str) -> Result<FrameSample, ThumbnailError>;
}
