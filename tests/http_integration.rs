//! Integration tests for the HTTP façade.
#![cfg(feature = "http")]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use semdup::api::{AppState, router};
use semdup::embedding::HashedEmbedder;
use semdup::models::{Entry, current_timestamp};
use semdup::storage::InMemoryEntryStore;
use semdup::{DetectionConfig, DuplicateDetector, Embedder, EntryStore, Error};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

fn detector() -> Arc<DuplicateDetector> {
    Arc::new(
        DuplicateDetector::new(
            Arc::new(HashedEmbedder::new()),
            Arc::new(InMemoryEntryStore::new()),
            DetectionConfig::default(),
        )
        .unwrap(),
    )
}

fn app_with(detector: Arc<DuplicateDetector>) -> Router {
    router(AppState::new(detector), BODY_LIMIT)
}

fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_dedup_added_then_duplicate() {
    let detector = detector();

    let (status, first) = send(
        app_with(Arc::clone(&detector)),
        post_json("/dedup", r#"{"data": "Hello world"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "added");
    assert_eq!(first["text"], "Hello world");
    assert!(first["timestamp"].as_str().unwrap().ends_with('Z'));
    assert!(first.get("score").is_none());

    let (status, second) = send(
        app_with(Arc::clone(&detector)),
        post_json("/dedup", r#"{"data": "Hello world"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "duplicate");
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["score"], "1.00");
    assert_eq!(detector.entry_count().unwrap(), 1);
}

#[tokio::test]
async fn test_similarity_endpoint() {
    let (status, body) = send(
        app_with(detector()),
        post_json(
            "/similarity",
            r#"{"existing": "brown fox jumps", "user": "brown fox jumps"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!((body["similarity_score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_similarity_fields_default_to_empty() {
    let detector = detector();
    let (status, body) = send(app_with(Arc::clone(&detector)), post_json("/similarity", "{}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["similarity_score"].as_f64(), Some(0.0));
    assert_eq!(detector.entry_count().unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (status, body) = send(app_with(detector()), post_json("/dedup", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_data_field_is_bad_request() {
    let (status, body) = send(app_with(detector()), post_json("/dedup", r#"{"text": "x"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("data"));
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let request = Request::post("/dedup")
        .body(Body::from(r#"{"data": "x"}"#))
        .unwrap();
    let (status, _) = send(app_with(detector()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let text = "x".repeat(BODY_LIMIT + 1);
    let body = serde_json::json!({ "data": text }).to_string();
    let (status, _) = send(app_with(detector()), post_json("/dedup", body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

/// Embedder that always fails.
struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dimensions(&self) -> usize {
        3
    }

    fn name(&self) -> &'static str {
        "broken"
    }

    fn embed(&self, _text: &str) -> semdup::Result<Vec<f32>> {
        Err(Error::EmbeddingFailure {
            cause: "model unavailable".to_string(),
        })
    }
}

#[tokio::test]
async fn test_processing_failure_is_internal_error() {
    let detector = Arc::new(
        DuplicateDetector::new(
            Arc::new(BrokenEmbedder),
            Arc::new(InMemoryEntryStore::new()),
            DetectionConfig::default(),
        )
        .unwrap(),
    );

    let (status, body) = send(
        app_with(Arc::clone(&detector)),
        post_json("/dedup", r#"{"data": "anything"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("model unavailable"));

    let (status, _) = send(
        app_with(detector),
        post_json("/similarity", r#"{"existing": "a", "user": "b"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_reports_store() {
    let store = InMemoryEntryStore::new();
    store
        .insert(&Entry::new("seed", vec![0.0; 384], current_timestamp()))
        .unwrap();
    let detector = Arc::new(
        DuplicateDetector::new(
            Arc::new(HashedEmbedder::new()),
            Arc::new(store),
            DetectionConfig::with_threshold(0.75).unwrap(),
        )
        .unwrap(),
    );

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(detector), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["entries"], 1);
    assert_eq!(body["backend"], "memory");
    assert!((body["threshold"].as_f64().unwrap() - 0.75).abs() < 1e-6);
}

#[tokio::test]
async fn test_metrics_endpoint_renders_when_enabled() {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::with_local_recorder(&recorder, || {
        metrics::counter!("dedup_checks_total", "outcome" => "added").increment(1);
    });

    let app = router(AppState::new(detector()).with_metrics(Some(handle)), BODY_LIMIT);
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("dedup_checks_total"));
}
