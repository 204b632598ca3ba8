//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serves the last published snapshot. The handler never talks to the upstream
//! and never triggers a cycle; it only reads what the poller published.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Content type of the Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    SnapshotUnavailable,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch metrics.").into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<Response, MetricsError> {
    debug!("Processing /metrics request");
    state.health_stats.record_http_request();
    state.health_stats.record_metrics_endpoint_call();

    let snapshot = state.snapshot.current().map_err(|e| {
        error!(error = %e, "Snapshot read failed");
        MetricsError::SnapshotUnavailable
    })?;

    let content_type = if snapshot.is_ready() {
        EXPOSITION_CONTENT_TYPE
    } else {
        debug!("No snapshot published yet, serving placeholder");
        "text/plain; charset=utf-8"
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        snapshot.text().to_string(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use alertsite_exporter::snapshot::PLACEHOLDER;
    use alertsite_exporter::{
        Config, CredentialManager, HealthStats, HttpTokenIssuer, SnapshotStore,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn test_state(snapshot: Arc<SnapshotStore>) -> SharedState {
        let issuer = Arc::new(HttpTokenIssuer::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
        ));
        Arc::new(AppState {
            config: Arc::new(Config::default()),
            snapshot,
            health_stats: Arc::new(HealthStats::new()),
            credentials: Arc::new(CredentialManager::new(issuer, None, Duration::from_secs(3300))),
            refresh_interval: Duration::from_secs(60),
            start_time: Instant::now(),
        })
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(response: &Response) -> &str {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_placeholder_before_first_publish() {
        let state = test_state(Arc::new(SnapshotStore::new()));

        let response = metrics_handler(State(state.clone())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "text/plain; charset=utf-8");
        assert_eq!(body_text(response).await, PLACEHOLDER);
        assert_eq!(
            state
                .health_stats
                .metrics_endpoint_calls
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_published_snapshot_uses_exposition_content_type() {
        let snapshot = Arc::new(SnapshotStore::new());
        let text = "# TYPE alertsite_app_health gauge\nalertsite_app_health{app=\"Sphere\",region=\"EMEA\"} 0\n";
        snapshot.publish(text.to_string(), 1);
        let state = test_state(snapshot);

        let response = metrics_handler(State(state)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), EXPOSITION_CONTENT_TYPE);
        assert_eq!(body_text(response).await, text);
    }

    #[tokio::test]
    async fn test_read_failure_is_generic_500() {
        let response = MetricsError::SnapshotUnavailable.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Failed to fetch metrics.");
    }
}
