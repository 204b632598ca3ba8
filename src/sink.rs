//! Gauge sink keyed by label tuple, with a Prometheus text renderer.
//!
//! The poller only ever writes into the sink and triggers a full render; it
//! never reads a value back.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::error::{ExporterError, Result};

/// Buffer capacity for exposition encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Every gauge family the exporter publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    AppHealth,
    AppStatusCode,
    AppErrorCategory,
    AppResponseSeconds,
    AppLastStatusTimestamp,
    Heartbeat,
    CycleDurationSeconds,
    LastCycleSuccess,
    RegionUp,
    RegionTargets,
    TokenRefreshes,
}

impl Gauge {
    pub const ALL: [Gauge; 11] = [
        Gauge::AppHealth,
        Gauge::AppStatusCode,
        Gauge::AppErrorCategory,
        Gauge::AppResponseSeconds,
        Gauge::AppLastStatusTimestamp,
        Gauge::Heartbeat,
        Gauge::CycleDurationSeconds,
        Gauge::LastCycleSuccess,
        Gauge::RegionUp,
        Gauge::RegionTargets,
        Gauge::TokenRefreshes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Gauge::AppHealth => "alertsite_app_health",
            Gauge::AppStatusCode => "alertsite_app_status_code",
            Gauge::AppErrorCategory => "alertsite_app_error_category",
            Gauge::AppResponseSeconds => "alertsite_app_response_seconds",
            Gauge::AppLastStatusTimestamp => "alertsite_app_last_status_timestamp_seconds",
            Gauge::Heartbeat => "alertsite_heartbeat",
            Gauge::CycleDurationSeconds => "alertsite_exporter_cycle_duration_seconds",
            Gauge::LastCycleSuccess => "alertsite_exporter_last_cycle_success",
            Gauge::RegionUp => "alertsite_exporter_region_up",
            Gauge::RegionTargets => "alertsite_exporter_region_targets",
            Gauge::TokenRefreshes => "alertsite_exporter_token_refreshes",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Gauge::AppHealth => "AlertSite app health (0=healthy, 1=unhealthy).",
            Gauge::AppStatusCode => "AlertSite last status as a numeric code (0=OK).",
            Gauge::AppErrorCategory => {
                "AlertSite app state bucketed in a small set of categories."
            }
            Gauge::AppResponseSeconds => "AlertSite last response time in seconds.",
            Gauge::AppLastStatusTimestamp => "Unix time of the last AlertSite status.",
            Gauge::Heartbeat => "Incremented once when the poll loop starts.",
            Gauge::CycleDurationSeconds => "Duration of the last poll cycle.",
            Gauge::LastCycleSuccess => "Whether the last poll cycle succeeded (1) or failed (0).",
            Gauge::RegionUp => "Whether the last fetch for a region succeeded (1) or failed (0).",
            Gauge::RegionTargets => "Targets exported for a region in the last cycle.",
            Gauge::TokenRefreshes => "Access token refreshes since start.",
        }
    }

    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Gauge::AppHealth
            | Gauge::AppStatusCode
            | Gauge::AppResponseSeconds
            | Gauge::AppLastStatusTimestamp => &["region", "app"],
            Gauge::AppErrorCategory => &["region", "app", "category"],
            Gauge::Heartbeat => &["instance"],
            Gauge::RegionUp | Gauge::RegionTargets => &["region"],
            Gauge::CycleDurationSeconds | Gauge::LastCycleSuccess | Gauge::TokenRefreshes => &[],
        }
    }

    fn index(&self) -> usize {
        Gauge::ALL
            .iter()
            .position(|g| g == self)
            .unwrap_or_default()
    }
}

/// Write-only gauge storage plus a full text render.
pub trait MetricSink: Send + Sync {
    /// Upsert, last write wins per (gauge, labels).
    fn set_gauge(&self, gauge: Gauge, labels: &[&str], value: f64) -> Result<()>;

    fn add_gauge(&self, gauge: Gauge, labels: &[&str], delta: f64) -> Result<()>;

    /// Drops one series; absent series are ignored.
    fn remove_gauge(&self, gauge: Gauge, labels: &[&str]);

    fn render_text(&self) -> Result<String>;
}

/// [`MetricSink`] backed by a private Prometheus registry.
pub struct PrometheusSink {
    registry: Registry,
    vecs: Vec<GaugeVec>,
}

impl PrometheusSink {
    /// Creates and registers every gauge family.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let mut vecs = Vec::with_capacity(Gauge::ALL.len());

        for gauge in Gauge::ALL {
            let vec = GaugeVec::new(Opts::new(gauge.name(), gauge.help()), gauge.labels())?;
            registry.register(Box::new(vec.clone()))?;
            vecs.push(vec);
        }

        debug!("Registered {} gauge families", vecs.len());
        Ok(Self { registry, vecs })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn vec(&self, gauge: Gauge) -> &GaugeVec {
        &self.vecs[gauge.index()]
    }

    fn series(&self, gauge: Gauge, labels: &[&str]) -> Result<prometheus::Gauge> {
        self.vec(gauge)
            .get_metric_with_label_values(labels)
            .map_err(|source| ExporterError::GaugeWrite {
                gauge: gauge.name(),
                source,
            })
    }
}

impl MetricSink for PrometheusSink {
    fn set_gauge(&self, gauge: Gauge, labels: &[&str], value: f64) -> Result<()> {
        self.series(gauge, labels)?.set(value);
        Ok(())
    }

    fn add_gauge(&self, gauge: Gauge, labels: &[&str], delta: f64) -> Result<()> {
        self.series(gauge, labels)?.add(delta);
        Ok(())
    }

    fn remove_gauge(&self, gauge: Gauge, labels: &[&str]) {
        // Removing a series that was never written is not an error here.
        let _ = self.vec(gauge).remove_label_values(labels);
    }

    fn render_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ExporterError::Render(prometheus::Error::Msg(e.to_string())))
    }
}
