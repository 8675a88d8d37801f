use thiserror::Error;

/// Errors raised by a cache store backend.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The store could not be reached or refused the operation
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while producing a thumbnail.
///
/// The type is `Clone` so a single generation result can be handed to every
/// request that was coalesced onto it.
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// Missing or malformed source locator, or an unsupported task type
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The source was unreachable, produced no frame, or extraction timed out
    #[error("Failed to fetch video frame: {message}")]
    UpstreamFetch { message: String },

    /// Decoding, resizing or encoding the frame failed
    #[error("Failed to transform frame: {message}")]
    Transform { message: String },

    /// The cache store failed and the service is configured to fail fast
    #[error(transparent)]
    CacheUnavailable(#[from] CacheError),

    /// The dispatcher queue is at capacity (should map to HTTP 503)
    #[error("Work queue is full ({capacity} pending tasks)")]
    QueueFull { capacity: usize },

    /// The dispatcher no longer accepts work
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl ThumbnailError {
    /// Shorthand for an [`ThumbnailError::InvalidInput`] error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ThumbnailError::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for an [`ThumbnailError::UpstreamFetch`] error.
    pub fn upstream(message: impl Into<String>) -> Self {
        ThumbnailError::UpstreamFetch {
            message: message.into(),
        }
    }

    /// Shorthand for a [`ThumbnailError::Transform`] error.
    pub fn transform(message: impl Into<String>) -> Self {
        ThumbnailError::Transform {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ThumbnailError::InvalidInput { .. })
    }
}
