//! Prometheus metrics
//!
//! The call flow records counters through the `metrics` facade; this module
//! installs the Prometheus recorder and serves its rendering.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::ServerError;

/// Install the global recorder
///
/// Must be called once at startup before recording any metrics.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Startup(format!("metrics recorder: {}", e)))?;

    register_default_metrics();
    Ok(handle)
}

/// Zero the series dashboards expect before the first call
fn register_default_metrics() {
    gauge!("hotline_sessions_active").set(0.0);

    for source in ["keyword", "remote", "fallback"] {
        counter!("hotline_classifications_total", "source" => source).absolute(0);
    }
    for kind in ["urgent_case", "callback"] {
        counter!("hotline_completions_total", "kind" => kind).absolute(0);
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    hotline_agent::telemetry::record_active_sessions(state.flow.store().len());

    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics disabled".to_string(),
        ),
    }
}
