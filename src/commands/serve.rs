//! Serve command handler.

use semdup::SemdupConfig;
use semdup::observability::ObservabilityHandle;

/// Serve command.
#[cfg(feature = "http")]
pub fn cmd_serve(
    mut config: SemdupConfig,
    host: Option<String>,
    port: Option<u16>,
    observability: &ObservabilityHandle,
) -> anyhow::Result<()> {
    use semdup::api::{self, AppState};
    use std::sync::Arc;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let detector = Arc::new(semdup::services::build_detector(&config)?);
    tracing::info!(
        backend = detector.store().backend_name(),
        embedder = detector.embedder().name(),
        threshold = detector.threshold(),
        "Detector ready"
    );

    let state = AppState::new(detector).with_metrics(observability.prometheus().cloned());
    api::serve(&config.server, state)?;
    Ok(())
}

/// Serve command (feature not enabled).
#[cfg(not(feature = "http"))]
pub fn cmd_serve(
    _config: SemdupConfig,
    _host: Option<String>,
    _port: Option<u16>,
    _observability: &ObservabilityHandle,
) -> anyhow::Result<()> {
    anyhow::bail!("HTTP server requires the 'http' feature")
}
