//! # Video Thumbnailer
//!
//! A thumbnail server for remote videos.
//!
//! Given a video URL, the server extracts one representative frame with
//! ffmpeg, fits it onto a fixed canvas (letterboxing with the frame's dominant
//! color when the aspect ratio differs), encodes it as JPEG and caches the
//! result for a configurable TTL.
//!
//! ## Features
//!
//! - **Cache-aside**: Thumbnails are generated once per TTL and served from memory
//! - **Coalescing**: Concurrent requests for the same video share one generation
//! - **Bounded work**: A fixed worker pool with a bounded queue and 503 backpressure
//! - **Consistent output**: Every thumbnail has exactly the configured dimensions
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`media`] - Frame extraction (ffmpeg adapter)
//! - [`thumbnail`] - Compositor, cache store, dispatcher and service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_thumbnailer::{
//!     create_router, Compositor, Dispatcher, DispatcherConfig, FfmpegFrameSource,
//!     MemoryCacheStore, RouterConfig, ServiceSettings, ThumbnailService,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::start(
//!         Arc::new(FfmpegFrameSource::new()),
//!         Compositor::default(),
//!         DispatcherConfig::default(),
//!     );
//!     let service = Arc::new(ThumbnailService::new(
//!         MemoryCacheStore::new(),
//!         dispatcher,
//!         ServiceSettings::default(),
//!     ));
//!
//!     let router = create_router(Arc::clone(&service), RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//!
//!     service.shutdown().await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod thumbnail;

// Re-export commonly used types
pub use config::Config;
pub use error::{CacheError, ThumbnailError};
pub use media::{probe_ffmpeg, FfmpegFrameSource, FrameSample, FrameSource};
pub use server::{create_router, AppState, RouterConfig};
pub use thumbnail::{
    CacheFailurePolicy, CacheStatus, CacheStore, Compositor, Dispatcher, DispatcherConfig,
    DispatcherStats, MemoryCacheStore, OutputSpec, ServiceSettings, ThumbnailResponse,
    ThumbnailService,
};
