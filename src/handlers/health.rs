//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! exporter health statistics and target data freshness.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Target data older than this many refresh intervals counts as stale.
const STALE_AFTER_INTERVALS: u32 = 3;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("alertsite-exporter ", env!("CARGO_PKG_VERSION"));

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    // A snapshot is published every cycle; freshness comes from target data.
    let since_success = state.health_stats.since_last_success();
    let stale_after = state.refresh_interval * STALE_AFTER_INTERVALS;

    let (status, message) = match since_success {
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Waiting for first successful poll cycle".to_string(),
        ),
        Some(age) if age <= stale_after => (StatusCode::OK, "OK".to_string()),
        Some(age) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Target data stale, last successful cycle {} ago", format_age(age)),
        ),
    };

    // Calculate uptime
    let uptime_seconds = state.health_stats.get_uptime_seconds();
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let token = match state.credentials.cached_age() {
        Some(age) => format!("cached, {} old", format_age(age)),
        None if state.credentials.has_credentials() => "not yet requested".to_string(),
        None => "credentials not configured".to_string(),
    };

    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nAccess token: {token} ({} refreshes, {} failures)\n\n{table}\n{FOOTER_TEXT}",
            state.credentials.refresh_count(),
            state.credentials.refresh_failure_count(),
        ),
    )
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 120 {
        format!("{}s", secs)
    } else {
        format!("{}m", secs / 60)
    }
}
