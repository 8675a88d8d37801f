//! Configuration management for the video thumbnailer.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `VTHUMB_` prefix
//! - Sensible defaults for all settings
//!
//! # Example
//!
//! ```ignore
//! use video_thumbnailer::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//! config.validate()?;
//!
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `VTHUMB_HOST` - Server bind address (default: 0.0.0.0)
//! - `VTHUMB_PORT` - Server port (default: 3000)
//! - `VTHUMB_CACHE_TTL` - Seconds a thumbnail stays cached (default: 60)
//! - `VTHUMB_CACHE_ENABLED` - Cache thumbnails at all (default: true)
//! - `VTHUMB_CACHE_CAPACITY` - Cache size in bytes (default: 64MB)
//! - `VTHUMB_CACHE_ENTRIES` - Maximum cached thumbnails (default: 4096)
//! - `VTHUMB_CACHE_FAILURE_POLICY` - `bypass` or `fail-fast` (default: bypass)
//! - `VTHUMB_WORKERS` - Worker pool size (default: available CPUs)
//! - `VTHUMB_QUEUE_CAPACITY` - Pending task limit (default: 256)
//! - `VTHUMB_OUTPUT_WIDTH` / `VTHUMB_OUTPUT_HEIGHT` - Canvas size (default: 640x360)
//! - `VTHUMB_JPEG_QUALITY` - JPEG quality (default: 80)
//! - `VTHUMB_FRAME_OFFSET` - Seek offset in seconds (default: 1.0)
//! - `VTHUMB_FFMPEG_PATH` - ffmpeg executable (default: ffmpeg)
//! - `VTHUMB_EXTRACT_TIMEOUT` - Extraction deadline in seconds, 0 disables (default: 30)
//! - `VTHUMB_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::media::DEFAULT_FFMPEG_PATH;
use crate::thumbnail::{
    default_worker_count, CacheFailurePolicy, DispatcherConfig, OutputSpec, ServiceSettings,
    DEFAULT_CACHE_CAPACITY, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_ENTRIES, DEFAULT_OUTPUT_HEIGHT,
    DEFAULT_OUTPUT_WIDTH, DEFAULT_QUEUE_CAPACITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Longest accepted cache TTL in seconds (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 3600;

/// Largest accepted output width or height in pixels.
pub const MAX_OUTPUT_DIMENSION: u32 = 4096;

/// Default frame offset in seconds.
pub const DEFAULT_FRAME_OFFSET_SECS: f64 = 1.0;

/// Default extraction deadline in seconds.
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Video Thumbnailer - A thumbnail server for remote videos.
///
/// Extracts one representative frame per video with ffmpeg, letterboxes it
/// onto a fixed canvas and serves the cached JPEG.
#[derive(Parser, Debug, Clone)]
#[command(name = "video-thumbnailer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "VTHUMB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "VTHUMB_PORT")]
    pub port: u16,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Seconds a generated thumbnail stays cached.
    ///
    /// Also used as the HTTP Cache-Control max-age.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS, env = "VTHUMB_CACHE_TTL")]
    pub cache_ttl: u64,

    /// Cache generated thumbnails.
    ///
    /// When disabled every request regenerates its thumbnail.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "VTHUMB_CACHE_ENABLED"
    )]
    pub cache_enabled: bool,

    /// Maximum total size of cached thumbnails in bytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "VTHUMB_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Maximum number of cached thumbnails.
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES, env = "VTHUMB_CACHE_ENTRIES")]
    pub cache_entries: usize,

    /// What to do when the cache store fails: "bypass" or "fail-fast".
    #[arg(long, default_value = "bypass", env = "VTHUMB_CACHE_FAILURE_POLICY")]
    pub cache_failure_policy: CacheFailurePolicy,

    // =========================================================================
    // Worker Pool Configuration
    // =========================================================================
    /// Number of concurrent thumbnail workers.
    ///
    /// If not specified, uses the number of available CPUs.
    #[arg(long, env = "VTHUMB_WORKERS")]
    pub workers: Option<usize>,

    /// Maximum number of tasks waiting for a worker.
    ///
    /// Requests beyond this limit are rejected with 503.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "VTHUMB_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Thumbnail width in pixels.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_WIDTH, env = "VTHUMB_OUTPUT_WIDTH")]
    pub output_width: u32,

    /// Thumbnail height in pixels.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_HEIGHT, env = "VTHUMB_OUTPUT_HEIGHT")]
    pub output_height: u32,

    /// JPEG quality for thumbnails (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "VTHUMB_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // Extraction Configuration
    // =========================================================================
    /// Seek offset in seconds for the representative frame.
    ///
    /// Videos shorter than this fall back to their first frame.
    #[arg(long, default_value_t = DEFAULT_FRAME_OFFSET_SECS, env = "VTHUMB_FRAME_OFFSET")]
    pub frame_offset: f64,

    /// Path to the ffmpeg executable.
    #[arg(long, default_value = DEFAULT_FFMPEG_PATH, env = "VTHUMB_FFMPEG_PATH")]
    pub ffmpeg_path: String,

    /// Deadline in seconds for a single frame extraction (0 = no deadline).
    #[arg(long, default_value_t = DEFAULT_EXTRACT_TIMEOUT_SECS, env = "VTHUMB_EXTRACT_TIMEOUT")]
    pub extract_timeout: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "VTHUMB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }

        // Validate cache settings
        if self.cache_ttl == 0 || self.cache_ttl > MAX_CACHE_TTL_SECS {
            return Err(format!(
                "cache_ttl must be between 1 and {} seconds",
                MAX_CACHE_TTL_SECS
            ));
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }
        if self.cache_entries == 0 {
            return Err("cache_entries must be greater than 0".to_string());
        }

        // Validate worker pool
        if self.workers == Some(0) {
            return Err("workers must be greater than 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        // Validate output
        if !(1..=MAX_OUTPUT_DIMENSION).contains(&self.output_width)
            || !(1..=MAX_OUTPUT_DIMENSION).contains(&self.output_height)
        {
            return Err(format!(
                "output_width and output_height must be between 1 and {}",
                MAX_OUTPUT_DIMENSION
            ));
        }
        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if !self.frame_offset.is_finite() || self.frame_offset < 0.0 {
            return Err("frame_offset must be a non-negative number of seconds".to_string());
        }

        if self.ffmpeg_path.trim().is_empty() {
            return Err("ffmpeg_path must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Output canvas geometry.
    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec::new(self.output_width, self.output_height)
    }

    /// Number of workers, resolving the CPU-count default.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    /// Seek offset for frame extraction (call validate() first).
    pub fn frame_offset(&self) -> Duration {
        Duration::try_from_secs_f64(self.frame_offset).unwrap_or_default()
    }

    /// Extraction deadline, `None` when disabled.
    pub fn extract_timeout(&self) -> Option<Duration> {
        (self.extract_timeout > 0).then(|| Duration::from_secs(self.extract_timeout))
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// Settings for the thumbnail service.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cache_ttl: self.cache_ttl(),
            cache_enabled: self.cache_enabled,
            failure_policy: self.cache_failure_policy,
        }
    }

    /// Settings for the worker pool.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.worker_count(),
            queue_capacity: self.queue_capacity,
            extract_timeout: self.extract_timeout(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
