//! Thumbnail service orchestrating cache-aside generation.
//!
//! The ThumbnailService is the main entry point for thumbnail requests. It
//! orchestrates:
//! - Locator validation
//! - Cache lookups
//! - In-flight coalescing of concurrent misses
//! - Task submission to the dispatcher
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ThumbnailService                          │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                     generate()                          │    │
//! │  │  1. Validate locator   4. Submit task, await result     │    │
//! │  │  2. Check cache        5. Cache on success              │    │
//! │  │  3. Join or lead       6. Share result with waiters     │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌────────────┐      ┌──────────────┐     ┌──────────────┐    │
//! │    │ CacheStore │      │  in_flight   │     │  Dispatcher  │    │
//! │    └────────────┘      └──────────────┘     └──────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::error::{CacheError, ThumbnailError};

use super::cache::{CacheStore, DEFAULT_CACHE_TTL};
use super::dispatcher::{Dispatcher, DispatcherStats, Task};

// =============================================================================
// Settings
// =============================================================================

/// What to do when the cache store itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheFailurePolicy {
    /// Log the failure and carry on as if the cache were empty
    #[default]
    Bypass,

    /// Fail the request with [`ThumbnailError::CacheUnavailable`]
    FailFast,
}

impl fmt::Display for CacheFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFailurePolicy::Bypass => write!(f, "bypass"),
            CacheFailurePolicy::FailFast => write!(f, "fail-fast"),
        }
    }
}

impl FromStr for CacheFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bypass" => Ok(CacheFailurePolicy::Bypass),
            "fail-fast" | "failfast" => Ok(CacheFailurePolicy::FailFast),
            other => Err(format!(
                "unknown cache failure policy '{}' (expected 'bypass' or 'fail-fast')",
                other
            )),
        }
    }
}

/// Cache behaviour of the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Lifetime of a cached thumbnail
    pub cache_ttl: Duration,

    /// When false, every request regenerates and nothing is cached
    pub cache_enabled: bool,

    /// Reaction to cache store failures
    pub failure_policy: CacheFailurePolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            failure_policy: CacheFailurePolicy::default(),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Response from the thumbnail service.
#[derive(Debug, Clone)]
pub struct ThumbnailResponse {
    /// The encoded JPEG thumbnail
    pub data: Bytes,

    /// Locator the thumbnail was generated from
    pub source_key: String,

    /// Whether the thumbnail was served from cache
    pub cache_hit: bool,

    /// Whether the result was shared from another request's generation
    pub coalesced: bool,
}

/// Result of a read-only cache probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub hit: bool,
}

// =============================================================================
// In-flight Tracking
// =============================================================================

type SharedResult = Option<Result<Bytes, ThumbnailError>>;
type InFlightMap = Mutex<HashMap<String, watch::Receiver<SharedResult>>>;

/// Leadership over one key's generation.
///
/// Dropping it unregisters the key. Waiters that never saw a result then
/// observe the closed channel and compete to become the next leader.
struct InFlight<'a> {
    map: &'a InFlightMap,
    key: String,
    tx: watch::Sender<SharedResult>,
}

impl InFlight<'_> {
    fn complete(&self, result: Result<Bytes, ThumbnailError>) {
        self.tx.send_replace(Some(result));
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(&self.key);
    }
}

enum Role<'a> {
    Leader(InFlight<'a>),
    Waiter(watch::Receiver<SharedResult>),
}

// =============================================================================
// Thumbnail Service
// =============================================================================

/// Service for generating and caching thumbnails.
///
/// # Type Parameters
///
/// * `C` - The cache store backend
///
/// # Example
///
/// ```ignore
/// use video_thumbnailer::thumbnail::{MemoryCacheStore, ServiceSettings, ThumbnailService};
///
/// let service = ThumbnailService::new(MemoryCacheStore::new(), dispatcher, ServiceSettings::default());
///
/// let response = service.generate("https://example.com/a.mp4").await?;
/// println!("{} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct ThumbnailService<C: CacheStore> {
    /// Store for encoded thumbnails
    cache: Arc<C>,

    /// Worker pool producing thumbnails
    dispatcher: Dispatcher,

    /// Generations currently in progress, by locator
    in_flight: InFlightMap,

    settings: ServiceSettings,
}

impl<C: CacheStore> ThumbnailService<C> {
    /// Create a new service owning its cache store.
    pub fn new(cache: C, dispatcher: Dispatcher, settings: ServiceSettings) -> Self {
        Self::with_shared_cache(Arc::new(cache), dispatcher, settings)
    }

    /// Create a new service with a shared cache store.
    pub fn with_shared_cache(
        cache: Arc<C>,
        dispatcher: Dispatcher,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            cache,
            dispatcher,
            in_flight: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// The cache store backing this service.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// The active settings.
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Get a thumbnail, using the cache when available.
    ///
    /// Concurrent misses for the same locator share a single generation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The locator is missing or malformed
    /// - The dispatcher rejects the task (queue full, shutting down)
    /// - Frame extraction or compositing fails
    /// - The cache store fails under [`CacheFailurePolicy::FailFast`]
    pub async fn generate(&self, key: &str) -> Result<ThumbnailResponse, ThumbnailError> {
        let key = validate_locator(key)?;

        if let Some(data) = self.cached(&key).await? {
            debug!(key = %key, "Thumbnail cache hit");
            return Ok(ThumbnailResponse {
                data,
                source_key: key,
                cache_hit: true,
                coalesced: false,
            });
        }

        loop {
            match self.join_or_lead(&key) {
                Role::Leader(flight) => {
                    // A previous leader may have stored the entry since the first lookup
                    let result = match self.cached(&key).await {
                        Ok(Some(data)) => {
                            flight.complete(Ok(data.clone()));
                            debug!(key = %key, "Thumbnail cache hit after taking the lead");
                            return Ok(ThumbnailResponse {
                                data,
                                source_key: key,
                                cache_hit: true,
                                coalesced: false,
                            });
                        }
                        Ok(None) => self.produce(&key).await,
                        Err(e) => Err(e),
                    };
                    flight.complete(result.clone());
                    return result.map(|data| ThumbnailResponse {
                        data,
                        source_key: key,
                        cache_hit: false,
                        coalesced: false,
                    });
                }
                Role::Waiter(mut rx) => {
                    let shared = match rx.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        Err(_) => None,
                    };

                    if let Some(result) = shared {
                        debug!(key = %key, "Joined in-flight generation");
                        return result.map(|data| ThumbnailResponse {
                            data,
                            source_key: key,
                            cache_hit: false,
                            coalesced: true,
                        });
                    }

                    debug!(key = %key, "In-flight leader went away, retrying");
                }
            }
        }
    }

    /// Report whether a valid cache entry exists, without generating anything.
    ///
    /// This never promotes the entry in the LRU order.
    pub async fn peek_cache_status(&self, key: &str) -> Result<CacheStatus, ThumbnailError> {
        let key = validate_locator(key)?;

        if !self.settings.cache_enabled {
            return Ok(CacheStatus { hit: false });
        }

        let hit = self.cache.contains(&key).await?;
        Ok(CacheStatus { hit })
    }

    /// Current dispatcher utilisation.
    pub fn stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    /// Whether new generations are still accepted.
    pub fn is_accepting(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Stop accepting work and wait for queued generations to finish.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    /// Register as the leader for `key`, or subscribe to the existing leader.
    fn join_or_lead(&self, key: &str) -> Role<'_> {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(rx) = map.get(key) {
            // A closed channel with no value belongs to a leader being dropped
            let finished = rx.borrow().is_some();
            if finished || rx.has_changed().is_ok() {
                return Role::Waiter(rx.clone());
            }
        }

        let (tx, rx) = watch::channel(None);
        map.insert(key.to_string(), rx);
        Role::Leader(InFlight {
            map: &self.in_flight,
            key: key.to_string(),
            tx,
        })
    }

    /// Generate through the dispatcher and cache the result.
    async fn produce(&self, key: &str) -> Result<Bytes, ThumbnailError> {
        let data = self.dispatcher.submit(Task::new(key))?.await?;
        self.store(key, data.clone()).await?;
        Ok(data)
    }

    async fn cached(&self, key: &str) -> Result<Option<Bytes>, ThumbnailError> {
        if !self.settings.cache_enabled {
            return Ok(None);
        }

        match self.cache.get(key).await {
            Ok(data) => Ok(data),
            Err(e) => self.on_cache_error(key, "get", e).map(|()| None),
        }
    }

    async fn store(&self, key: &str, data: Bytes) -> Result<(), ThumbnailError> {
        if !self.settings.cache_enabled {
            return Ok(());
        }

        match self.cache.set(key, data, self.settings.cache_ttl).await {
            Ok(()) => Ok(()),
            Err(e) => self.on_cache_error(key, "set", e),
        }
    }

    fn on_cache_error(
        &self,
        key: &str,
        operation: &'static str,
        error: CacheError,
    ) -> Result<(), ThumbnailError> {
        match self.settings.failure_policy {
            CacheFailurePolicy::Bypass => {
                warn!(key = %key, operation, error = %error, "Cache store failed, bypassing");
                Ok(())
            }
            CacheFailurePolicy::FailFast => Err(error.into()),
        }
    }
}

// =============================================================================
// Locator Validation
// =============================================================================

/// Check that `locator` is an absolute http(s) URL and return it trimmed.
pub fn validate_locator(locator: &str) -> Result<String, ThumbnailError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ThumbnailError::invalid_input("missing video url"));
    }

    let url = Url::parse(locator)
        .map_err(|e| ThumbnailError::invalid_input(format!("malformed video url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ThumbnailError::invalid_input(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ThumbnailError::invalid_input("video url has no host"));
    }

    Ok(locator.to_string())
}

// =============================================================================
// Tests
// =============================================================================
