//! HTTP request handlers for the thumbnail API.
//!
//! # Endpoints
//!
//! - `GET /thumbnail?url=<video>` - Serve a thumbnail
//! - `POST /generate-thumbnail` - Serve a thumbnail for a JSON task
//! - `GET /cache-status?url=<video>` - Report whether a thumbnail is cached
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ThumbnailError;
use crate::thumbnail::{CacheStore, DispatcherStats, ThumbnailResponse, ThumbnailService};

/// Response header reporting whether the thumbnail came from cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-thumbnail-cache-hit");

/// The only task type `POST /generate-thumbnail` accepts.
pub const VIDEO_TASK_TYPE: &str = "video";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the thumbnail service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: CacheStore> {
    /// The thumbnail service
    pub service: Arc<ThumbnailService<C>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u64,
}

impl<C: CacheStore> AppState<C> {
    /// Create a new application state with a custom cache max-age.
    pub fn with_cache_max_age(service: Arc<ThumbnailService<C>>, cache_max_age: u64) -> Self {
        Self {
            service,
            cache_max_age,
        }
    }
}

impl<C: CacheStore> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters carrying the video locator.
#[derive(Debug, Default, Deserialize)]
pub struct UrlQueryParams {
    /// Absolute http(s) URL of the video
    #[serde(default)]
    pub url: Option<String>,
}

/// JSON body of `POST /generate-thumbnail`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Absolute http(s) URL of the video
    #[serde(default)]
    pub url: Option<String>,

    /// Task type, must be `"video"`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_request", "queue_full")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Body of `GET /cache-status`.
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    #[serde(rename = "cacheHit")]
    pub cache_hit: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy" or "draining")
    pub status: String,

    /// Service version
    pub version: String,

    /// Worker pool utilisation
    pub dispatcher: DispatcherStats,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ThumbnailError to HTTP response.
///
/// 4xx errors are logged at WARN level and 5xx errors at ERROR level.
impl IntoResponse for ThumbnailError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ThumbnailError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
            ThumbnailError::UpstreamFetch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error")
            }
            ThumbnailError::Transform { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transform_error")
            }
            ThumbnailError::CacheUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "cache_unavailable")
            }
            ThumbnailError::QueueFull { .. } => (StatusCode::SERVICE_UNAVAILABLE, "queue_full"),
            ThumbnailError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle thumbnail requests.
///
/// # Endpoint
///
/// `GET /thumbnail?url=<video>`
///
/// # Response
///
/// - `200 OK`: JPEG thumbnail with `Content-Type: image/jpeg`
/// - `400 Bad Request`: Missing or malformed `url`
/// - `500 Internal Server Error`: Extraction or processing error
/// - `503 Service Unavailable`: Work queue full or shutting down
///
/// # Headers
///
/// - `Content-Type: image/jpeg`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Thumbnail-Cache-Hit: true|false`
pub async fn thumbnail_handler<C: CacheStore + 'static>(
    State(state): State<AppState<C>>,
    query: Result<Query<UrlQueryParams>, QueryRejection>,
) -> Result<Response, ThumbnailError> {
    let url = locator_param(query)?;
    let response = state.service.generate(&url).await?;

    Ok(jpeg_response(response, state.cache_max_age))
}

/// Handle JSON thumbnail tasks.
///
/// # Endpoint
///
/// `POST /generate-thumbnail`
///
/// ```json
/// { "url": "https://example.com/a.mp4", "type": "video" }
/// ```
///
/// Responds exactly like `GET /thumbnail`. A body that is not valid JSON, or
/// a `type` other than `"video"`, is rejected with `400 Bad Request`.
pub async fn generate_thumbnail_handler<C: CacheStore + 'static>(
    State(state): State<AppState<C>>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ThumbnailError> {
    let Json(request) =
        body.map_err(|e| ThumbnailError::invalid_input(format!("invalid request body: {}", e)))?;

    match request.kind.as_deref() {
        Some(VIDEO_TASK_TYPE) => {}
        Some(other) => {
            return Err(ThumbnailError::invalid_input(format!(
                "unsupported task type '{}'",
                other
            )))
        }
        None => return Err(ThumbnailError::invalid_input("missing task type")),
    }

    let url = request.url.unwrap_or_default();
    let response = state.service.generate(&url).await?;

    Ok(jpeg_response(response, state.cache_max_age))
}

/// Handle cache probes.
///
/// # Endpoint
///
/// `GET /cache-status?url=<video>`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// { "cacheHit": true }
/// ```
pub async fn cache_status_handler<C: CacheStore + 'static>(
    State(state): State<AppState<C>>,
    query: Result<Query<UrlQueryParams>, QueryRejection>,
) -> Result<Json<CacheStatusResponse>, ThumbnailError> {
    let url = locator_param(query)?;
    let status = state.service.peek_cache_status(&url).await?;

    Ok(Json(CacheStatusResponse {
        cache_hit: status.hit,
    }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "dispatcher": { "workers": 4, "active": 1, "queued": 0, "queue_capacity": 256 }
/// }
/// ```
pub async fn health_handler<C: CacheStore + 'static>(
    State(state): State<AppState<C>>,
) -> Json<HealthResponse> {
    let status = if state.service.is_accepting() {
        "healthy"
    } else {
        "draining"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dispatcher: state.service.stats(),
    })
}

/// Extract the `url` parameter, turning a malformed query into a JSON 400.
fn locator_param(
    query: Result<Query<UrlQueryParams>, QueryRejection>,
) -> Result<String, ThumbnailError> {
    let Query(params) =
        query.map_err(|e| ThumbnailError::invalid_input(format!("invalid query string: {}", e)))?;
    Ok(params.url.unwrap_or_default())
}

fn jpeg_response(response: ThumbnailResponse, cache_max_age: u64) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", cache_max_age),
            ),
            (CACHE_HIT_HEADER, response.cache_hit.to_string()),
        ],
        response.data,
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
