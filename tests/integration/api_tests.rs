//! API integration tests for thumbnail retrieval and error handling.
//!
//! Tests verify:
//! - Thumbnail retrieval via GET and POST
//! - Cache status probing
//! - Error cases (missing url, malformed url, wrong task type, upstream failure)
//! - HTTP response codes, headers and JSON error bodies

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

use video_thumbnailer::thumbnail::{DispatcherConfig, ServiceSettings};

use super::test_utils::{
    body_bytes, body_json, decode_jpeg, is_valid_jpeg, query_value, MockFrameSource, TestHarness,
    VIDEO_URL,
};

fn get(uri: String) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn thumbnail_uri(url: &str) -> String {
    format!("/thumbnail?url={}", query_value(url))
}

fn cache_status_uri(url: &str) -> String {
    format!("/cache-status?url={}", query_value(url))
}

// =============================================================================
// GET /thumbnail
// =============================================================================

#[tokio::test]
async fn test_thumbnail_success() {
    let harness = TestHarness::new(MockFrameSource::new());
    let router = harness.router();

    let response = router.oneshot(get(thumbnail_uri(VIDEO_URL))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
    assert_eq!(
        response.headers().get("x-thumbnail-cache-hit").unwrap(),
        "false"
    );

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body), "Response should be a valid JPEG");
    assert_eq!(decode_jpeg(&body).dimensions(), (640, 360));
}

#[tokio::test]
async fn test_cache_hit_header() {
    let harness = TestHarness::new(MockFrameSource::new());
    let router = harness.router();

    let first = router
        .clone()
        .oneshot(get(thumbnail_uri(VIDEO_URL)))
        .await
        .unwrap();
    assert_eq!(first.headers().get("x-thumbnail-cache-hit").unwrap(), "false");
    let first_body = body_bytes(first).await;

    let second = router.oneshot(get(thumbnail_uri(VIDEO_URL))).await.unwrap();
    assert_eq!(second.headers().get("x-thumbnail-cache-hit").unwrap(), "true");
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(harness.source.calls(), 1);
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let harness = TestHarness::new(MockFrameSource::new());

    for uri in ["/thumbnail", "/thumbnail?url=", "/thumbnail?url=%20%20"] {
        let response = harness.router().oneshot(get(uri.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
        assert_eq!(json["status"], 400);
    }

    // Never reached the dispatcher or the cache
    assert_eq!(harness.source.calls(), 0);
    assert_eq!(harness.cache().set_count(), 0);
    assert_eq!(harness.service.stats().active, 0);
}

#[tokio::test]
async fn test_duplicate_url_param_is_json_bad_request() {
    let harness = TestHarness::new(MockFrameSource::new());
    let url = query_value(VIDEO_URL);

    for path in ["/thumbnail", "/cache-status"] {
        let uri = format!("{}?url={}&url={}", path, url, url);
        let response = harness.router().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
        assert_eq!(json["status"], 400);
    }
    assert_eq!(harness.source.calls(), 0);
}

#[tokio::test]
async fn test_malformed_url_is_bad_request() {
    let harness = TestHarness::new(MockFrameSource::new());

    for url in ["not-a-url", "/videos/a.mp4", "ftp://example.com/a.mp4"] {
        let response = harness.router().oneshot(get(thumbnail_uri(url))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", url);
    }
    assert_eq!(harness.source.calls(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_server_error() {
    let harness = TestHarness::new(MockFrameSource::new().failing_on("missing"));
    let url = "https://example.com/missing.mp4";

    let response = harness.router().oneshot(get(thumbnail_uri(url))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "upstream_error");
    assert!(json["message"].as_str().unwrap().contains("404"));
    assert_eq!(harness.cache().set_count(), 0);
}

#[tokio::test]
async fn test_queue_full_is_service_unavailable() {
    let harness = TestHarness::with_options(
        MockFrameSource::new().gated(),
        DispatcherConfig::default()
            .with_workers(1)
            .with_queue_capacity(1),
        ServiceSettings::default(),
    );

    // One task running, one queued
    let running = {
        let router = harness.router();
        tokio::spawn(async move {
            router
                .oneshot(get(thumbnail_uri("https://example.com/0.mp4")))
                .await
                .unwrap()
        })
    };
    harness.source.wait_for_calls(1).await;

    let queued = {
        let router = harness.router();
        tokio::spawn(async move {
            router
                .oneshot(get(thumbnail_uri("https://example.com/1.mp4")))
                .await
                .unwrap()
        })
    };
    while harness.service.stats().queued < 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let rejected = harness
        .router()
        .oneshot(get(thumbnail_uri("https://example.com/2.mp4")))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(rejected).await;
    assert_eq!(json["error"], "queue_full");

    harness.source.open_gate();
    assert_eq!(running.await.unwrap().status(), StatusCode::OK);
    assert_eq!(queued.await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shutting_down_is_service_unavailable() {
    let harness = TestHarness::new(MockFrameSource::new());
    harness.service.shutdown().await;

    let response = harness.router().oneshot(get(thumbnail_uri(VIDEO_URL))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "shutting_down");
}

// =============================================================================
// POST /generate-thumbnail
// =============================================================================

#[tokio::test]
async fn test_generate_thumbnail_success() {
    let harness = TestHarness::new(MockFrameSource::new());

    let body = format!(r#"{{"url":"{}","type":"video"}}"#, VIDEO_URL);
    let response = harness
        .router()
        .oneshot(post_json("/generate-thumbnail", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert!(is_valid_jpeg(&body_bytes(response).await));

    // Same cache as GET /thumbnail
    let response = harness
        .router()
        .oneshot(get(thumbnail_uri(VIDEO_URL)))
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-thumbnail-cache-hit").unwrap(), "true");
}

#[tokio::test]
async fn test_generate_thumbnail_wrong_type() {
    let harness = TestHarness::new(MockFrameSource::new());

    for body in [
        format!(r#"{{"url":"{}","type":"image"}}"#, VIDEO_URL),
        format!(r#"{{"url":"{}"}}"#, VIDEO_URL),
    ] {
        let response = harness
            .router()
            .oneshot(post_json("/generate-thumbnail", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_request");
    }
    assert_eq!(harness.source.calls(), 0);
}

#[tokio::test]
async fn test_generate_thumbnail_malformed_body() {
    let harness = TestHarness::new(MockFrameSource::new());

    let response = harness
        .router()
        .oneshot(post_json("/generate-thumbnail", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(harness.source.calls(), 0);
}

#[tokio::test]
async fn test_generate_thumbnail_missing_url() {
    let harness = TestHarness::new(MockFrameSource::new());

    let response = harness
        .router()
        .oneshot(post_json("/generate-thumbnail", r#"{"type":"video"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.source.calls(), 0);
}

// =============================================================================
// GET /cache-status
// =============================================================================

#[tokio::test]
async fn test_cache_status_before_and_after() {
    let harness = TestHarness::new(MockFrameSource::new());

    let response = harness
        .router()
        .oneshot(get(cache_status_uri(VIDEO_URL)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"cacheHit": false}));

    // The probe itself never generates
    assert_eq!(harness.source.calls(), 0);

    harness
        .router()
        .oneshot(get(thumbnail_uri(VIDEO_URL)))
        .await
        .unwrap();

    let response = harness
        .router()
        .oneshot(get(cache_status_uri(VIDEO_URL)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"cacheHit": true}));
}

#[tokio::test]
async fn test_cache_status_missing_url() {
    let harness = TestHarness::new(MockFrameSource::new());

    let response = harness
        .router()
        .oneshot(get("/cache-status".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cache_status_store_failure() {
    let harness = TestHarness::new(MockFrameSource::new());
    harness.cache().set_down(true);

    let response = harness
        .router()
        .oneshot(get(cache_status_uri(VIDEO_URL)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "cache_unavailable");
}

// =============================================================================
// GET /health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new(MockFrameSource::new());

    let response = harness
        .router()
        .oneshot(get("/health".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["dispatcher"]["workers"], 2);
    assert_eq!(json["dispatcher"]["queue_capacity"], 16);
    assert_eq!(json["dispatcher"]["active"], 0);
    assert_eq!(json["dispatcher"]["queued"], 0);
}

#[tokio::test]
async fn test_health_reports_draining() {
    let harness = TestHarness::new(MockFrameSource::new());
    harness.service.shutdown().await;

    let response = harness
        .router()
        .oneshot(get("/health".to_string()))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "draining");
}

#[tokio::test]
async fn test_cors_preflight() {
    let harness = TestHarness::new(MockFrameSource::new());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/generate-thumbnail")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
