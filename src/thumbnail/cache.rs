//! Cache store for encoded thumbnails.
//!
//! The orchestrator talks to the cache through the [`CacheStore`] trait so the
//! backend can be swapped. [`MemoryCacheStore`] is the in-process default: an
//! LRU keyed by source locator where every entry carries its own expiry.
//!
//! # Expiry
//!
//! Entries are written with a TTL. An expired entry is treated as a miss and
//! removed lazily when it is next read; [`MemoryCacheStore::purge_expired`]
//! sweeps the whole store, and [`spawn_expiry_sweep`] runs that sweep on an
//! interval.
//!
//! # Size-Based Eviction
//!
//! The store tracks the total size of cached images in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::CacheError;

/// Default cache capacity: 64MB
pub const DEFAULT_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Default time-to-live for a cached thumbnail.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

// =============================================================================
// CacheStore Trait
// =============================================================================

/// Key/value store with per-entry expiry, keyed by source locator.
///
/// Implementations provide their own consistency for single operations. A
/// `set` for an existing key overwrites it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an unexpired entry.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Check for an unexpired entry without touching recency or contents.
    async fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached thumbnail and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fully encoded image, ready to be sent as-is
    pub value: Bytes,

    /// Expiry deadline
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Memory Cache Store
// =============================================================================

/// In-memory LRU cache for encoded thumbnails with TTL and size-based capacity.
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use video_thumbnailer::thumbnail::{CacheStore, MemoryCacheStore};
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCacheStore::new();
///
///     let key = "https://example.com/a.mp4";
///     let jpeg = Bytes::from(vec![0xFF, 0xD8, 0xFF, 0xE0]);
///
///     cache.set(key, jpeg.clone(), Duration::from_secs(60)).await.unwrap();
///     assert_eq!(cache.get(key).await.unwrap(), Some(jpeg));
/// }
/// ```
pub struct MemoryCacheStore {
    /// The underlying LRU cache
    cache: RwLock<LruCache<String, CacheEntry>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl MemoryCacheStore {
    /// Create a new store with default capacity (64MB, 4096 entries).
    pub fn new() -> Self {
        Self::with_capacity_and_entries(DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new store with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new store with specified capacity and maximum entries.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(max_entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Insert an entry, evicting least-recently-used entries over capacity.
    ///
    /// Entries larger than the whole capacity are not stored.
    pub async fn put(&self, key: String, entry: CacheEntry) {
        let data_size = entry.value.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // If key exists, subtract old size first
        if let Some(old) = cache.pop(&key) {
            *current_size = current_size.saturating_sub(old.value.len());
        }

        if data_size > self.max_size {
            return;
        }

        // Entry-count eviction happens inside the LRU itself
        if let Some((_, evicted)) = cache.push(key, entry) {
            *current_size = current_size.saturating_sub(evicted.value.len());
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((_, evicted)) = cache.pop_lru() {
                *current_size = current_size.saturating_sub(evicted.value.len());
            } else {
                break;
            }
        }
    }

    /// Remove every expired entry.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = cache.pop(key) {
                *current_size = current_size.saturating_sub(entry.value.len());
            }
        }

        expired.len()
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    /// Get the current number of entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Get the current total size of cached images in bytes.
    pub async fn size(&self) -> usize {
        let current_size = self.current_size.read().await;
        *current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut cache = self.cache.write().await;

        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = cache.pop(key) {
                let mut current_size = self.current_size.write().await;
                *current_size = current_size.saturating_sub(entry.value.len());
            }
        }

        Ok(None)
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let cache = self.cache.read().await;
        Ok(cache
            .peek(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Unavailable(format!("ttl {:?} is out of range", ttl)))?;
        let entry = CacheEntry { value, expires_at };
        self.put(key.to_string(), entry).await;
        Ok(())
    }
}

/// Purge expired entries from `cache` every `every`.
///
/// Returns `None` when `every` is zero. Abort the handle to stop sweeping.
pub fn spawn_expiry_sweep(
    cache: Arc<MemoryCacheStore>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Swept expired thumbnails");
            }
        }
    }))
}

// =============================================================================
// Tests
// =============================================================================
