//! Thumbnail service layer.
//!
//! This module turns a video locator into a cached, fixed-size JPEG
//! thumbnail.
//!
//! # Architecture
//!
//! The thumbnail service sits between the HTTP layer and the media adapter:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            ThumbnailService             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  CacheStore  │  │   Dispatcher    │  │
//! │  │  (encoded    │  │  (N workers,    │  │
//! │  │   JPEGs)     │  │   bounded FIFO) │  │
//! │  └──────────────┘  └────────┬────────┘  │
//! └─────────────────────────────┼───────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────┐
//! │     FrameSource  ──►  Compositor        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ThumbnailService`]: Main entry point, cache-aside flow with in-flight coalescing
//! - [`CacheStore`]: Async key/value store with per-entry TTL
//! - [`MemoryCacheStore`]: In-process LRU store with size-based eviction
//! - [`Dispatcher`]: Fixed-size worker pool draining a bounded queue
//! - [`Compositor`]: Resize or letterbox onto the output canvas, then JPEG encode
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use video_thumbnailer::thumbnail::{CacheStore, MemoryCacheStore};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create a store with 16MB capacity
//!     let cache = MemoryCacheStore::with_capacity(16 * 1024 * 1024);
//!
//!     let key = "https://example.com/a.mp4";
//!     if cache.get(key).await.unwrap().is_none() {
//!         let jpeg = Bytes::from(vec![/* JPEG data */]);
//!         cache.set(key, jpeg, Duration::from_secs(60)).await.unwrap();
//!     }
//!     assert!(cache.contains(key).await.unwrap());
//! }
//! ```

mod cache;
mod compositor;
mod dispatcher;
mod service;

pub use cache::{
    spawn_expiry_sweep, CacheEntry, CacheStore, MemoryCacheStore, DEFAULT_CACHE_CAPACITY,
    DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES,
};
pub use compositor::{
    clamp_quality, dominant_color, fit_within, Compositor, OutputSpec,
    Placement, ASPECT_TOLERANCE, DEFAULT_JPEG_QUALITY, DEFAULT_OUTPUT_HEIGHT,
    DEFAULT_OUTPUT_WIDTH, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use dispatcher::{
    default_worker_count, Dispatcher, DispatcherConfig, DispatcherStats, Task, TaskHandle,
    DEFAULT_EXTRACT_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
};
pub use service::{
    validate_locator, CacheFailurePolicy, CacheStatus, ServiceSettings, ThumbnailResponse,
    ThumbnailService,
};
