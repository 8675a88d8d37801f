//! End-to-end pipeline tests: geometry, coalescing and worker bounds.

use std::sync::Arc;
use std::time::Duration;

use video_thumbnailer::thumbnail::{DispatcherConfig, ServiceSettings};

use super::test_utils::{
    assert_color_near, decode_jpeg, is_valid_jpeg, solid_frame, split_frame, MockFrameSource,
    TestHarness, VIDEO_URL,
};

// =============================================================================
// Output Geometry
// =============================================================================

#[tokio::test]
async fn test_landscape_frame_is_resized() {
    let source = MockFrameSource::new().with_frame(VIDEO_URL, solid_frame(1920, 1080, [30, 120, 200]));
    let harness = TestHarness::new(source);

    let response = harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(is_valid_jpeg(&response.data));

    let thumbnail = decode_jpeg(&response.data);
    assert_eq!(thumbnail.dimensions(), (640, 360));

    // No padding anywhere, corners included
    assert_color_near(thumbnail.get_pixel(0, 0), [30, 120, 200], 12);
    assert_color_near(thumbnail.get_pixel(639, 359), [30, 120, 200], 12);

    assert_eq!(harness.cache().written_keys(), vec![VIDEO_URL.to_string()]);
}

#[tokio::test]
async fn test_portrait_frame_is_letterboxed() {
    // Mean of pure blue and pure yellow halves is mid gray
    let frame = split_frame(1080, 1920, [0, 0, 255], [255, 255, 0]);
    let source = MockFrameSource::new().with_frame(VIDEO_URL, frame);
    let harness = TestHarness::new(source);

    let response = harness.service.generate(VIDEO_URL).await.unwrap();
    let thumbnail = decode_jpeg(&response.data);
    assert_eq!(thumbnail.dimensions(), (640, 360));

    // Scaled frame is 203x360, centered at x = 218
    assert_color_near(thumbnail.get_pixel(50, 180), [128, 128, 128], 16);
    assert_color_near(thumbnail.get_pixel(590, 180), [128, 128, 128], 16);
    assert_color_near(thumbnail.get_pixel(260, 180), [0, 0, 255], 24);
    assert_color_near(thumbnail.get_pixel(380, 180), [255, 255, 0], 24);
}

#[tokio::test]
async fn test_ultrawide_frame_is_letterboxed_vertically() {
    let source =
        MockFrameSource::new().with_frame(VIDEO_URL, solid_frame(2400, 1000, [200, 40, 40]));
    let harness = TestHarness::new(source);

    let response = harness.service.generate(VIDEO_URL).await.unwrap();
    let thumbnail = decode_jpeg(&response.data);

    assert_eq!(thumbnail.dimensions(), (640, 360));
    // A solid frame pads with its own color
    assert_color_near(thumbnail.get_pixel(320, 5), [200, 40, 40], 16);
    assert_color_near(thumbnail.get_pixel(320, 180), [200, 40, 40], 16);
}

#[tokio::test]
async fn test_tiny_frame_is_upscaled() {
    let source = MockFrameSource::new().with_frame(VIDEO_URL, solid_frame(16, 9, [0, 200, 0]));
    let harness = TestHarness::new(source);

    let response = harness.service.generate(VIDEO_URL).await.unwrap();
    assert_eq!(decode_jpeg(&response.data).dimensions(), (640, 360));
}

// =============================================================================
// Coalescing
// =============================================================================

#[tokio::test]
async fn test_concurrent_misses_share_one_task() {
    let harness = TestHarness::new(MockFrameSource::new().with_delay(Duration::from_millis(100)));
    let service = Arc::clone(&harness.service);

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.generate(VIDEO_URL).await })
        })
        .collect();

    let mut responses = Vec::new();
    for task in tasks {
        responses.push(task.await.unwrap().unwrap());
    }

    assert_eq!(harness.source.calls(), 1);
    assert_eq!(harness.cache().set_count(), 1);
    assert!(responses.iter().all(|r| r.data == responses[0].data));
    assert!(responses.iter().filter(|r| r.coalesced).count() >= 1);
}

#[tokio::test]
async fn test_coalesced_failure_is_shared() {
    let harness = TestHarness::new(
        MockFrameSource::new()
            .failing_on("missing")
            .with_delay(Duration::from_millis(100)),
    );
    let service = Arc::clone(&harness.service);
    let url = "https://example.com/missing.mp4";

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.generate(url).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_err());
    }
    assert_eq!(harness.source.calls(), 1);
    assert_eq!(harness.cache().set_count(), 0);
}

// =============================================================================
// Worker Bounds
// =============================================================================

#[tokio::test]
async fn test_concurrency_bounded_by_workers() {
    let harness = TestHarness::with_options(
        MockFrameSource::new().with_delay(Duration::from_millis(20)),
        DispatcherConfig::default()
            .with_workers(3)
            .with_queue_capacity(64),
        ServiceSettings::default(),
    );
    let service = Arc::clone(&harness.service);

    let tasks: Vec<_> = (0..15)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .generate(&format!("https://example.com/{}.mp4", i))
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(harness.source.calls(), 15);
    assert!(harness.source.peak_concurrency() <= 3);
    assert!(harness.source.peak_concurrency() >= 1);
}

#[tokio::test]
async fn test_shutdown_drains_queued_work() {
    let harness = TestHarness::with_options(
        MockFrameSource::new().with_delay(Duration::from_millis(20)),
        DispatcherConfig::default()
            .with_workers(1)
            .with_queue_capacity(8),
        ServiceSettings::default(),
    );
    let service = Arc::clone(&harness.service);

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .generate(&format!("https://example.com/{}.mp4", i))
                    .await
            })
        })
        .collect();
    harness.source.wait_for_calls(1).await;
    while harness.service.stats().queued < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    harness.service.shutdown().await;

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(harness.source.calls(), 4);
    assert!(!harness.service.is_accepting());
}
