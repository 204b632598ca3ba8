//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers, and the startup wiring that constructs the
//! credential manager, sink, snapshot store and poller once.

use alertsite_exporter::{
    build_client, AlertSiteClient, Config, CredentialManager, HealthStats, HttpTokenIssuer, Poller,
    PrometheusSink, SnapshotStore,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Effective configuration, password already redacted.
    pub config: Arc<Config>,
    pub snapshot: Arc<SnapshotStore>,
    pub health_stats: Arc<HealthStats>,
    pub credentials: Arc<CredentialManager>,
    /// Poll period, used to judge snapshot staleness.
    pub refresh_interval: Duration,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

/// Everything the server and the poll loop share.
pub struct Components {
    pub poller: Arc<Poller>,
    pub credentials: Arc<CredentialManager>,
    pub snapshot: Arc<SnapshotStore>,
    pub health_stats: Arc<HealthStats>,
}

impl Components {
    pub fn app_state(&self, config: &Config) -> SharedState {
        Arc::new(AppState {
            config: Arc::new(config.redacted()),
            snapshot: self.snapshot.clone(),
            health_stats: self.health_stats.clone(),
            credentials: self.credentials.clone(),
            refresh_interval: config.refresh_interval(),
            start_time: Instant::now(),
        })
    }
}

/// Builds the HTTP client and every core component from the effective config.
pub fn build_components(config: &Config) -> anyhow::Result<Components> {
    let client = build_client(config).context("failed to build upstream HTTP client")?;

    let credentials = config.credentials();
    if credentials.is_none() {
        warn!("Upstream username/password are not configured; every poll cycle will fail until they are");
    }

    let issuer = Arc::new(HttpTokenIssuer::new(client.clone(), config.base_url()));
    let credentials = Arc::new(CredentialManager::new(
        issuer,
        credentials,
        config.token_refresh_after(),
    ));

    let regions = config.regions();
    debug!(regions = regions.len(), base_url = config.base_url(), "Configuring status source");
    let source = Arc::new(AlertSiteClient::new(
        client,
        config.base_url(),
        regions,
        config.filter().context("invalid target filter")?,
    ));

    let sink = Arc::new(PrometheusSink::new().context("failed to register gauges")?);
    let snapshot = Arc::new(SnapshotStore::new());
    let health_stats = Arc::new(HealthStats::new());

    let poller = Arc::new(
        Poller::new(
            credentials.clone(),
            source,
            sink,
            snapshot.clone(),
            health_stats.clone(),
        )
        .with_interval(config.refresh_interval())
        .with_instance(config.instance())
        .with_status_offset(config.status_offset()?),
    );

    Ok(Components {
        poller,
        credentials,
        snapshot,
        health_stats,
    })
}
