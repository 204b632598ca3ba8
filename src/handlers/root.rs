//! Root endpoint handler for the landing page.

use axum::{extract::State, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;

    let mut out = String::new();
    writeln!(out, "AlertSite Exporter").ok();
    writeln!(out, "==================").ok();
    writeln!(out).ok();
    writeln!(out, "Uptime: {}h {}m {}s", hours, minutes, seconds).ok();
    writeln!(
        out,
        "Polling every {} seconds",
        state.refresh_interval.as_secs()
    )
    .ok();
    writeln!(out).ok();
    writeln!(out, "Endpoints:").ok();
    writeln!(out, "  /metrics   Prometheus metrics (last published snapshot)").ok();
    if state.config.enable_health.unwrap_or(true) {
        writeln!(out, "  /health    Exporter health and poll statistics").ok();
    }
    writeln!(out, "  /config    Effective configuration").ok();
    writeln!(out).ok();
    writeln!(out, "{FOOTER_TEXT}").ok();

    ([("Content-Type", "text/plain; charset=utf-8")], out)
}
