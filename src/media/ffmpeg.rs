//! ffmpeg-backed frame extraction.
//!
//! The extractor runs the `ffmpeg` CLI as a child process, seeks to a fixed
//! offset and asks for exactly one frame, piped to stdout as PNG. PNG is
//! lossless, so the compositor sees the decoded frame unchanged.
//!
//! # Design Decisions
//!
//! - **Seek before input**: `-ss` is placed before `-i` so ffmpeg seeks in the
//!   container instead of decoding everything up to the offset.
//!
//! - **Zero-offset fallback**: clips shorter than the offset yield no frame.
//!   When that happens the extraction is repeated once at `0`.
//!
//! - **No scaling in ffmpeg**: geometry is handled by the compositor so that
//!   letterboxing can use the frame's own dominant color.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::ImageFormat;
use tokio::process::Command;
use tracing::{debug, warn};

use super::frame::{FrameSample, FrameSource};
use crate::error::ThumbnailError;

/// Default ffmpeg executable, resolved through `PATH`.
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Default seek offset for the representative frame.
pub const DEFAULT_FRAME_OFFSET: Duration = Duration::from_secs(1);

/// Longest stderr excerpt carried in an error message.
const MAX_STDERR_EXCERPT: usize = 512;

// =============================================================================
// FfmpegFrameSource
// =============================================================================

/// Extracts frames by spawning `ffmpeg`.
///
/// The child is killed if the extraction future is dropped, which is what
/// makes the dispatcher's extraction deadline effective.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg_path: String,
    offset: Duration,
}

impl FfmpegFrameSource {
    /// Create an extractor using `ffmpeg` from `PATH` and a one second offset.
    pub fn new() -> Self {
        Self::with_options(DEFAULT_FFMPEG_PATH, DEFAULT_FRAME_OFFSET)
    }

    /// Create an extractor with an explicit executable and seek offset.
    pub fn with_options(ffmpeg_path: impl Into<String>, offset: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            offset,
        }
    }

    /// The configured seek offset.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// The configured ffmpeg executable.
    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Run ffmpeg once at `offset` and return the raw PNG bytes it wrote.
    async fn run_extraction(
        &self,
        locator: &str,
        offset: Duration,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(build_args(locator, offset))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ThumbnailError::upstream(format!(
                    "failed to spawn {}: {}",
                    self.ffmpeg_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(ThumbnailError::upstream(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            )));
        }

        Ok(output.stdout)
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn extract_frame(&self, locator: &str) -> Result<FrameSample, ThumbnailError> {
        let mut png = self.run_extraction(locator, self.offset).await?;

        if png.is_empty() && !self.offset.is_zero() {
            debug!(
                locator = locator,
                offset_ms = self.offset.as_millis() as u64,
                "No frame at offset, retrying from start"
            );
            png = self.run_extraction(locator, Duration::ZERO).await?;
        }

        if png.is_empty() {
            return Err(ThumbnailError::upstream(format!(
                "no decodable video frame in {}",
                locator
            )));
        }

        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| ThumbnailError::transform(format!("failed to decode frame: {}", e)))?;

        FrameSample::from_image(decoded.to_rgb8())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Build the ffmpeg argument list for a single-frame PNG extraction.
fn build_args(locator: &str, offset: Duration) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", offset.as_secs_f64()),
        "-i".to_string(),
        locator.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
        "-vcodec".to_string(),
        "png".to_string(),
        "-".to_string(),
    ]
}

/// Last part of ffmpeg's stderr, trimmed for error messages.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_STDERR_EXCERPT {
        return text.to_string();
    }

    let mut start = text.len() - MAX_STDERR_EXCERPT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Check that the ffmpeg executable can be run.
///
/// Returns the first line of `ffmpeg -version` on success.
pub async fn probe_ffmpeg(ffmpeg_path: &str) -> Result<String, String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("{}", e))?;

    if !output.status.success() {
        warn!(status = %output.status, "ffmpeg -version failed");
        return Err(format!("ffmpeg -version exited with {}", output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}

// =============================================================================
// Tests
// =============================================================================
