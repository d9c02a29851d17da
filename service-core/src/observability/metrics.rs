use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::AppError;

/// Renders the process-wide Prometheus registry.
#[derive(Clone)]
pub struct MetricsHandle(PrometheusHandle);

impl MetricsHandle {
    pub fn render(&self) -> String {
        self.0.render()
    }

    /// Handle to a recorder that is never installed globally.
    pub fn detached() -> Self {
        MetricsHandle(PrometheusBuilder::new().build_recorder().handle())
    }
}

/// Installs the global `metrics` recorder. Call once per process.
pub fn init_metrics() -> Result<MetricsHandle, AppError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Config(anyhow::anyhow!("metrics recorder: {}", e)))?;
    Ok(MetricsHandle(handle))
}
