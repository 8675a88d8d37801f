//! HTTP server layer for the video thumbnailer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │    GET /thumbnail   POST /generate-thumbnail   GET /cache-status│
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error → JSON) │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    cache_status_handler, generate_thumbnail_handler, health_handler, thumbnail_handler, AppState,
    CacheStatusResponse, ErrorResponse, GenerateRequest, HealthResponse, UrlQueryParams,
    CACHE_HIT_HEADER, VIDEO_TASK_TYPE,
};
pub use routes::{create_router, RouterConfig};
