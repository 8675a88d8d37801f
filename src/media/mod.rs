//! Media transform adapter.
//!
//! This module turns a source locator into a single decoded video frame. The
//! rest of the crate only depends on the [`FrameSource`] trait; the ffmpeg
//! backed [`FfmpegFrameSource`] is the production implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Dispatcher worker            │
//! └────────────────────┬────────────────────┘
//!                      │ extract_frame(locator)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           FrameSource Trait             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          FfmpegFrameSource              │
//! │  (seek → 1 frame → PNG pipe → decode)   │
//! └─────────────────────────────────────────┘
//! ```

mod ffmpeg;
mod frame;

pub use ffmpeg::{probe_ffmpeg, FfmpegFrameSource, DEFAULT_FFMPEG_PATH, DEFAULT_FRAME_OFFSET};
pub use frame::{FrameSample, FrameSource};
