//! Cache behaviour tests.
//!
//! Tests verify:
//! - Cache-aside: one generation per key while the entry is valid
//! - TTL expiry and regeneration
//! - Failed generations are never cached
//! - The cache-enabled switch
//! - Store outages under both failure policies

use std::time::Duration;

use video_thumbnailer::error::ThumbnailError;
use video_thumbnailer::thumbnail::{CacheFailurePolicy, DispatcherConfig, ServiceSettings};

use super::test_utils::{MockFrameSource, TestHarness, VIDEO_URL};

fn harness_with(settings: ServiceSettings) -> TestHarness {
    TestHarness::with_options(
        MockFrameSource::new().failing_on("missing"),
        DispatcherConfig::default().with_workers(2),
        settings,
    )
}

#[tokio::test]
async fn test_generate_then_peek_hits() {
    let harness = TestHarness::new(MockFrameSource::new());

    assert!(!harness.service.peek_cache_status(VIDEO_URL).await.unwrap().hit);
    harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(harness.service.peek_cache_status(VIDEO_URL).await.unwrap().hit);
}

#[tokio::test]
async fn test_single_cache_write_under_locator_key() {
    let harness = TestHarness::new(MockFrameSource::new());

    for _ in 0..5 {
        harness.service.generate(VIDEO_URL).await.unwrap();
    }

    assert_eq!(harness.cache().set_count(), 1);
    assert_eq!(harness.cache().written_keys(), vec![VIDEO_URL.to_string()]);
    assert_eq!(harness.source.calls(), 1);
}

#[tokio::test]
async fn test_repeated_hits_are_byte_identical() {
    let harness = TestHarness::new(MockFrameSource::new());

    let first = harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(!first.cache_hit);

    for _ in 0..3 {
        let next = harness.service.generate(VIDEO_URL).await.unwrap();
        assert!(next.cache_hit);
        assert_eq!(next.data, first.data);
    }
    assert_eq!(harness.source.calls(), 1);
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let harness = harness_with(ServiceSettings {
        cache_ttl: Duration::from_millis(200),
        ..ServiceSettings::default()
    });

    harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(harness.service.peek_cache_status(VIDEO_URL).await.unwrap().hit);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!harness.service.peek_cache_status(VIDEO_URL).await.unwrap().hit);

    // An expired entry is regenerated
    let response = harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(!response.cache_hit);
    assert_eq!(harness.source.calls(), 2);
    assert_eq!(harness.cache().set_count(), 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let harness = harness_with(ServiceSettings::default());
    let url = "https://example.com/missing.mp4";

    for _ in 0..2 {
        let result = harness.service.generate(url).await;
        assert!(matches!(result, Err(ThumbnailError::UpstreamFetch { .. })));
    }

    assert_eq!(harness.source.calls(), 2);
    assert_eq!(harness.cache().set_count(), 0);
    assert!(!harness.service.peek_cache_status(url).await.unwrap().hit);

    // The pool keeps serving other keys
    assert!(harness.service.generate(VIDEO_URL).await.is_ok());
}

#[tokio::test]
async fn test_invalid_key_never_touches_cache() {
    let harness = TestHarness::new(MockFrameSource::new());

    let result = harness.service.generate("").await;
    assert!(matches!(result, Err(ThumbnailError::InvalidInput { .. })));
    assert_eq!(harness.cache().set_count(), 0);
    assert_eq!(harness.cache().len().await, 0);
}

#[tokio::test]
async fn test_cache_disabled() {
    let harness = harness_with(ServiceSettings {
        cache_enabled: false,
        ..ServiceSettings::default()
    });

    for _ in 0..3 {
        let response = harness.service.generate(VIDEO_URL).await.unwrap();
        assert!(!response.cache_hit);
    }

    assert_eq!(harness.source.calls(), 3);
    assert_eq!(harness.cache().set_count(), 0);
    assert!(!harness.service.peek_cache_status(VIDEO_URL).await.unwrap().hit);
}

#[tokio::test]
async fn test_store_outage_bypassed_by_default() {
    let harness = harness_with(ServiceSettings::default());
    harness.cache().set_down(true);

    let first = harness.service.generate(VIDEO_URL).await.unwrap();
    let second = harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(!first.cache_hit);
    assert!(!second.cache_hit);
    assert_eq!(harness.source.calls(), 2);

    // Recovery: the next miss is cached again
    harness.cache().set_down(false);
    harness.service.generate(VIDEO_URL).await.unwrap();
    assert!(harness.service.generate(VIDEO_URL).await.unwrap().cache_hit);
}

#[tokio::test]
async fn test_store_outage_fail_fast() {
    let harness = harness_with(ServiceSettings {
        failure_policy: CacheFailurePolicy::FailFast,
        ..ServiceSettings::default()
    });
    harness.cache().set_down(true);

    let result = harness.service.generate(VIDEO_URL).await;
    assert!(matches!(result, Err(ThumbnailError::CacheUnavailable(_))));
    assert_eq!(harness.source.calls(), 0);
}
