//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Metrics configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsConfig {
    /// Whether metrics are recorded.
    pub enabled: bool,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    ///
    /// `SEMDUP_METRICS_ENABLED` is already folded into the settings by
    /// [`crate::SemdupConfig::apply_env`].
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        Self {
            enabled: settings.and_then(|s| s.enabled).unwrap_or(false),
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Returns `None` when metrics are disabled; the `metrics` macros are then
/// no-ops.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a global recorder is already installed.
pub fn install_prometheus(config: MetricsConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::InvalidInput(format!("cannot install metrics recorder: {e}")))?;

    tracing::debug!("Prometheus recorder installed");
    Ok(Some(handle))
}

/// Renders the current metrics in Prometheus text format.
#[must_use]
pub fn render(handle: &PrometheusHandle) -> String {
    handle.run_upkeep();
    handle.render()
}
