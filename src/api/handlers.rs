//! Endpoint handlers.

use super::AppState;
use super::error::ApiError;
use crate::services::DetectionResult;
use crate::similarity::round_to;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

/// Body of `POST /similarity`.
#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    /// Reference text.
    #[serde(default)]
    pub existing: String,
    /// Text to compare against the reference.
    #[serde(default)]
    pub user: String,
}

/// Response of `POST /similarity`.
#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    /// Cosine similarity rounded to 4 decimals.
    pub similarity_score: f64,
}

/// Body of `POST /dedup`.
#[derive(Debug, Deserialize)]
pub struct DedupRequest {
    /// Text to check and store.
    pub data: String,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the store answered.
    pub status: &'static str,
    /// Number of stored entries.
    pub entries: usize,
    /// Storage backend name.
    pub backend: &'static str,
    /// Duplicate threshold.
    pub threshold: f32,
}

/// Runs a blocking detector call off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// `POST /similarity`: scores two texts without touching the store.
pub async fn similarity(
    State(state): State<AppState>,
    payload: Result<Json<SimilarityRequest>, JsonRejection>,
) -> Result<Json<SimilarityResponse>, ApiError> {
    let Json(request) = payload?;
    let detector = state.detector;
    let score = run_blocking(move || detector.similarity(&request.existing, &request.user)).await?;

    Ok(Json(SimilarityResponse {
        similarity_score: round_to(score, 4),
    }))
}

/// `POST /dedup`: reports a duplicate or stores the text as a new entry.
pub async fn dedup(
    State(state): State<AppState>,
    payload: Result<Json<DedupRequest>, JsonRejection>,
) -> Result<Json<DetectionResult>, ApiError> {
    let Json(request) = payload?;
    let detector = state.detector;
    let result = run_blocking(move || detector.add_or_find_duplicate(&request.data)).await?;
    Ok(Json(result))
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let detector = state.detector;
    let backend = detector.store().backend_name();
    let threshold = detector.threshold();
    let entries = run_blocking(move || detector.entry_count()).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        entries,
        backend,
        threshold,
    }))
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .metrics
        .ok_or_else(|| ApiError::NotFound("metrics are disabled".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::observability::render_metrics(&handle),
    ))
}
