//! HTTP façade over the duplicate detector.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/similarity` | `{"existing", "user"}` | `{"similarity_score"}` |
//! | `POST` | `/dedup` | `{"data"}` | duplicate or added result |
//! | `GET` | `/health` | | entry count, backend, threshold |
//! | `GET` | `/metrics` | | Prometheus text (404 when disabled) |
//!
//! Detector calls block, so handlers run them on the blocking pool.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{DedupRequest, HealthResponse, SimilarityRequest, SimilarityResponse};

use crate::config::ServerConfig;
use crate::services::DuplicateDetector;
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::io;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Detector serving every request.
    pub detector: Arc<DuplicateDetector>,
    /// Prometheus handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates state without a metrics endpoint.
    #[must_use]
    pub const fn new(detector: Arc<DuplicateDetector>) -> Self {
        Self {
            detector,
            metrics: None,
        }
    }

    /// Attaches a Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Builds the application router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/similarity", post(handlers::similarity))
        .route("/dedup", post(handlers::dedup))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until Ctrl-C.
///
/// Builds its own tokio runtime; call from synchronous code.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created, the address cannot be
/// bound or the server fails.
pub fn serve(config: &ServerConfig, state: AppState) -> io::Result<()> {
    let app = router(state, config.max_body_bytes);
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "Starting semdup HTTP server");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        },
    }
}
