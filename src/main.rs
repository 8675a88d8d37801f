//! Video Thumbnailer - A thumbnail server for remote videos.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_thumbnailer::{
    config::Config,
    media::{probe_ffmpeg, FfmpegFrameSource},
    server::{create_router, RouterConfig},
    thumbnail::{spawn_expiry_sweep, Compositor, Dispatcher, MemoryCacheStore, ThumbnailService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("video-thumbnailer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Output: {}x{} JPEG, quality {}",
        config.output_width, config.output_height, config.jpeg_quality
    );
    info!(
        "  Workers: {}, queue capacity: {}",
        config.worker_count(),
        config.queue_capacity
    );
    if config.cache_enabled {
        info!(
            "  Cache: {}s TTL, {}MB / {} entries, on failure: {}",
            config.cache_ttl,
            config.cache_capacity / (1024 * 1024),
            config.cache_entries,
            config.cache_failure_policy
        );
    } else {
        warn!("  Cache: DISABLED - every request regenerates its thumbnail");
    }

    // ffmpeg must be runnable before we accept any request
    match probe_ffmpeg(&config.ffmpeg_path).await {
        Ok(version) => info!("  ffmpeg: {}", version),
        Err(e) => {
            error!("ffmpeg is not available at '{}': {}", config.ffmpeg_path, e);
            error!("Install ffmpeg or point --ffmpeg-path at the executable");
            return ExitCode::FAILURE;
        }
    }

    // Build the pipeline
    let source = Arc::new(FfmpegFrameSource::with_options(
        config.ffmpeg_path.clone(),
        config.frame_offset(),
    ));
    let compositor = Compositor::new(config.output_spec(), config.jpeg_quality);
    let dispatcher = Dispatcher::start(source, compositor, config.dispatcher_config());
    let cache = Arc::new(MemoryCacheStore::with_capacity_and_entries(
        config.cache_capacity,
        config.cache_entries,
    ));
    let sweep = spawn_expiry_sweep(Arc::clone(&cache), config.cache_ttl());
    let service = Arc::new(ThumbnailService::with_shared_cache(
        cache,
        dispatcher,
        config.service_settings(),
    ));

    let router = create_router(Arc::clone(&service), build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl 'http://{}/thumbnail?url=<video-url>' -o thumb.jpg", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Let queued generations finish before exiting
    service.shutdown().await;
    if let Some(sweep) = sweep {
        sweep.abort();
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "video_thumbnailer=debug,tower_http=debug"
    } else {
        "video_thumbnailer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_ttl)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Resolve when Ctrl+C is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, draining..."),
        Err(e) => {
            // Without a signal handler the server runs until killed
            warn!("Unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
