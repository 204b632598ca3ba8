//! AlertSite Prometheus Exporter Library
//!
//! Polls the AlertSite v3 site-status report for a fixed set of regions,
//! turns every monitored target into a handful of gauges and keeps a rendered
//! exposition snapshot that HTTP handlers can serve without touching the
//! upstream.
//!
//! # Components
//!
//! - **Credential manager**: caches one access token and refreshes it at
//!   most once across concurrent callers
//! - **Status source**: per-region report fetch, filtering and name
//!   normalization
//! - **Classifier**: maps an unhealthy target to a status code and a small
//!   closed set of error categories
//! - **Poller**: the background loop that writes gauges and publishes
//!   snapshots
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use alertsite_exporter::{
//!     build_client, AlertSiteClient, Config, CredentialManager, HealthStats, HttpTokenIssuer,
//!     Poller, PrometheusSink, SnapshotStore,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> alertsite_exporter::Result<()> {
//! let config = Config::default();
//! let client = build_client(&config)?;
//!
//! let issuer = Arc::new(HttpTokenIssuer::new(client.clone(), config.base_url()));
//! let credentials = Arc::new(CredentialManager::new(
//!     issuer,
//!     config.credentials(),
//!     config.token_refresh_after(),
//! ));
//! let source = Arc::new(AlertSiteClient::new(
//!     client,
//!     config.base_url(),
//!     config.regions(),
//!     config.filter()?,
//! ));
//! let snapshot = Arc::new(SnapshotStore::new());
//!
//! let poller = Arc::new(
//!     Poller::new(
//!         credentials,
//!         source,
//!         Arc::new(PrometheusSink::new()?),
//!         snapshot.clone(),
//!         Arc::new(HealthStats::new()),
//!     )
//!     .with_interval(config.refresh_interval()),
//! );
//! tokio::spawn(poller.run(CancellationToken::new()));
//!
//! println!("{}", snapshot.current()?.text());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod credentials;
pub mod error;
pub mod health_stats;
pub mod http;
pub mod poller;
pub mod region;
pub mod sink;
pub mod snapshot;
pub mod source;

// Re-export main types for convenience
pub use classifier::{classify, Classification, ErrorCategory};
pub use config::{Config, ConfigFormat};
pub use credentials::{AccessToken, CredentialManager, Credentials, HttpTokenIssuer, TokenIssuer};
pub use error::{ExporterError, Result};
pub use health_stats::HealthStats;
pub use http::build_client;
pub use poller::{CycleReport, Poller};
pub use region::{Region, RegionConfig, TargetFilter};
pub use sink::{Gauge, MetricSink, PrometheusSink};
pub use snapshot::{Snapshot, SnapshotStore};
pub use source::{AlertSiteClient, NormalizedMetric, StatusSource};
