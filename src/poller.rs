//! Background poll loop.
//!
//! One cycle obtains a token, fetches every configured region in a fixed
//! order, writes each target's gauges into the sink, then renders the sink and
//! publishes the text as a new snapshot. The loop sleeps for the refresh
//! interval between cycles and stops promptly once its cancellation token
//! fires.
//!
//! Every cycle that is not cancelled publishes, even when the token or every
//! region failed. Target series of regions that were not fetched keep their
//! last values, while the heartbeat and the `alertsite_exporter_*` gauges
//! always describe the cycle just finished.
//!
//! No error ends the loop. Each cycle runs in its own task so that even a
//! panic only costs that cycle.

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{classify, ErrorCategory};
use crate::credentials::{AccessToken, CredentialManager};
use crate::error::Result;
use crate::health_stats::HealthStats;
use crate::region::Region;
use crate::sink::{Gauge, MetricSink};
use crate::snapshot::SnapshotStore;
use crate::source::{FetchStatus, NormalizedMetric, RegionFetch, StatusSource};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Upstream timestamp layout, e.g. `2024-05-01 10:15:00`.
const LAST_STATUS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a single cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub token_obtained: bool,
    /// The upstream rejected the token and a forced refresh was attempted.
    pub token_rejected: bool,
    pub regions_ok: Vec<Region>,
    pub regions_failed: Vec<Region>,
    pub targets: usize,
    pub unhealthy: usize,
    /// Response time or timestamp values that could not be parsed.
    pub parse_failures: usize,
    /// Token obtained and at least one region fetched, or none configured.
    pub refreshed: bool,
    pub published: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CycleReport {
    /// Token obtained and every region fetched.
    pub fn is_clean(&self) -> bool {
        self.token_obtained && self.regions_failed.is_empty() && !self.cancelled
    }
}

pub struct Poller {
    credentials: Arc<CredentialManager>,
    source: Arc<dyn StatusSource>,
    sink: Arc<dyn MetricSink>,
    snapshot: Arc<SnapshotStore>,
    stats: Arc<HealthStats>,
    interval: Duration,
    instance: String,
    status_offset: FixedOffset,
    cycles: AtomicU64,
}

impl Poller {
    pub fn new(
        credentials: Arc<CredentialManager>,
        source: Arc<dyn StatusSource>,
        sink: Arc<dyn MetricSink>,
        snapshot: Arc<SnapshotStore>,
        stats: Arc<HealthStats>,
    ) -> Self {
        Self {
            credentials,
            source,
            sink,
            snapshot,
            stats,
            interval: DEFAULT_INTERVAL,
            instance: "alertsite-exporter".to_string(),
            status_offset: Utc.fix(),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Value of the heartbeat's `instance` label.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    /// Offset applied to upstream timestamps, which carry no zone.
    pub fn with_status_offset(mut self, offset: FixedOffset) -> Self {
        self.status_offset = offset;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs cycles until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if let Err(e) = self
            .sink
            .add_gauge(Gauge::Heartbeat, &[self.instance.as_str()], 1.0)
        {
            warn!(error = %e, "Failed to record heartbeat");
        }
        info!(
            interval_secs = self.interval.as_secs(),
            instance = %self.instance,
            "Poll loop started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let this = Arc::clone(&self);
            let child = cancel.clone();
            let started = Instant::now();
            match tokio::spawn(async move { this.run_cycle(&child).await }).await {
                Ok(report) => {
                    debug!(
                        cycle = report.cycle,
                        targets = report.targets,
                        published = report.published,
                        duration_ms = report.duration.as_millis() as u64,
                        "Poll cycle finished"
                    );
                }
                Err(e) if e.is_panic() => {
                    error!(error = %e, "Poll cycle panicked, continuing with the next one");
                    self.stats.record_cycle_panic();
                    self.stats
                        .record_cycle(started.elapsed().as_secs_f64(), 0, false);
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle task was cancelled");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Poll loop stopped");
    }

    /// Runs exactly one cycle.
    #[instrument(skip_all)]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let regions = self.source.regions();

        match self.credentials.get_token().await {
            Ok(token) => {
                report.token_obtained = true;
                self.poll_regions(token, &regions, cancel, &mut report).await;
            }
            Err(e) => {
                self.stats.record_token_failure();
                warn!(cycle, error = %e, kind = e.kind(), "No access token, skipping region fetches");
                for &region in &regions {
                    self.mark_region_down(region);
                }
            }
        }

        report.refreshed = report.token_obtained
            && !report.cancelled
            && (!report.regions_ok.is_empty() || regions.is_empty());
        report.duration = started.elapsed();
        self.write_self_metrics(&report);

        if report.cancelled {
            debug!(cycle, "Cycle cancelled before completion, not publishing");
        } else {
            if !report.refreshed {
                warn!(
                    cycle,
                    token_obtained = report.token_obtained,
                    failed = report.regions_failed.len(),
                    "No fresh target data this cycle, publishing loop health with previous target values"
                );
            }
            match self.sink.render_text() {
                Ok(text) => {
                    self.snapshot.publish(text, cycle);
                    self.stats.record_publish();
                    report.published = true;
                }
                Err(e) => {
                    self.stats.record_render_failure();
                    error!(cycle, error = %e, "Render failed, previous snapshot stays published");
                }
            }
        }

        self.stats.record_cycle(
            report.duration.as_secs_f64(),
            report.targets as u64,
            report.refreshed,
        );
        report
    }

    async fn poll_regions(
        &self,
        mut token: AccessToken,
        regions: &[Region],
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) {
        for &region in regions {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut fetch = self.source.fetch_region(&token, region).await;

            // One forced refresh per cycle.
            if !report.token_rejected && is_token_rejected(&fetch) {
                report.token_rejected = true;
                self.stats.record_token_rejection();
                match self.credentials.force_refresh().await {
                    Ok(renewed) => {
                        token = renewed;
                        fetch = self.source.fetch_region(&token, region).await;
                    }
                    Err(e) => {
                        warn!(%region, error = %e, "Forced token refresh failed");
                    }
                }
            }

            match fetch {
                Ok(fetch) if fetch.is_success() => {
                    let written = self.record_region(region, &fetch.metrics, report);
                    self.set(Gauge::RegionUp, &[region.as_str()], 1.0);
                    self.set(Gauge::RegionTargets, &[region.as_str()], written as f64);
                    report.regions_ok.push(region);
                }
                Ok(fetch) => {
                    warn!(%region, status = ?fetch.status, "Region contributed no metrics this cycle");
                    self.region_failed(region, report);
                }
                Err(e) => {
                    warn!(%region, error = %e, kind = e.kind(), "Region fetch failed");
                    self.region_failed(region, report);
                }
            }
        }
    }

    fn region_failed(&self, region: Region, report: &mut CycleReport) {
        self.stats.record_region_failure();
        self.mark_region_down(region);
        report.regions_failed.push(region);
    }

    fn mark_region_down(&self, region: Region) {
        self.set(Gauge::RegionUp, &[region.as_str()], 0.0);
        self.set(Gauge::RegionTargets, &[region.as_str()], 0.0);
    }

    fn record_region(
        &self,
        region: Region,
        metrics: &[NormalizedMetric],
        report: &mut CycleReport,
    ) -> usize {
        for metric in metrics {
            self.record_metric(metric, report);
        }
        debug!(%region, targets = metrics.len(), "Region gauges written");
        metrics.len()
    }

    fn record_metric(&self, metric: &NormalizedMetric, report: &mut CycleReport) {
        let region = metric.region.as_str();
        let app = metric.app.as_str();
        let classification = classify(metric);

        self.set(Gauge::AppHealth, &[region, app], f64::from(metric.health));
        self.set(
            Gauge::AppStatusCode,
            &[region, app],
            f64::from(classification.status_code),
        );

        for stale in ErrorCategory::ALL
            .iter()
            .filter(|c| **c != classification.category)
        {
            self.sink
                .remove_gauge(Gauge::AppErrorCategory, &[region, app, stale.as_str()]);
        }
        self.set(
            Gauge::AppErrorCategory,
            &[region, app, classification.category.as_str()],
            1.0,
        );

        if let Some(raw) = metric.response_time.as_deref() {
            match parse_response_seconds(raw) {
                Some(seconds) => self.set(Gauge::AppResponseSeconds, &[region, app], seconds),
                None => {
                    debug!(region, app, value = raw, "Unparseable response time skipped");
                    report.parse_failures += 1;
                }
            }
        }

        if let Some(raw) = metric.last_status_at.as_deref() {
            match parse_last_status(raw, self.status_offset) {
                Some(ts) => self.set(Gauge::AppLastStatusTimestamp, &[region, app], ts as f64),
                None => {
                    debug!(region, app, value = raw, "Unparseable status timestamp skipped");
                    report.parse_failures += 1;
                }
            }
        }

        report.targets += 1;
        if !metric.is_healthy() {
            report.unhealthy += 1;
        }
    }

    fn write_self_metrics(&self, report: &CycleReport) {
        self.set(
            Gauge::CycleDurationSeconds,
            &[],
            report.duration.as_secs_f64(),
        );
        self.set(
            Gauge::LastCycleSuccess,
            &[],
            if report.is_clean() { 1.0 } else { 0.0 },
        );
        self.set(
            Gauge::TokenRefreshes,
            &[],
            self.credentials.refresh_count() as f64,
        );
    }

    fn set(&self, gauge: Gauge, labels: &[&str], value: f64) {
        if let Err(e) = self.sink.set_gauge(gauge, labels, value) {
            warn!(gauge = gauge.name(), error = %e, "Gauge write failed");
        }
    }
}

fn is_token_rejected(fetch: &Result<RegionFetch>) -> bool {
    matches!(fetch, Ok(f) if f.status == FetchStatus::TokenRejected)
}

/// Decimal seconds; non-finite values are rejected.
pub fn parse_response_seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Unix seconds for an upstream `yyyy-MM-dd HH:mm:ss` stamp at `offset`.
pub fn parse_last_status(raw: &str, offset: FixedOffset) -> Option<i64> {
    NaiveDateTime::parse_from_str(raw.trim(), LAST_STATUS_FORMAT)
        .ok()?
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_seconds() {
        assert_eq!(parse_response_seconds(" 1.25 "), Some(1.25));
        assert_eq!(parse_response_seconds("0"), Some(0.0));
        assert_eq!(parse_response_seconds("n/a"), None);
        assert_eq!(parse_response_seconds("NaN"), None);
        assert_eq!(parse_response_seconds(""), None);
    }

    #[test]
    fn test_parse_last_status_utc() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            parse_last_status("2024-05-01 10:15:00", utc),
            Some(1_714_558_500)
        );
        assert_eq!(parse_last_status("01/05/2024 10:15", utc), None);
    }

    #[test]
    fn test_parse_last_status_applies_offset() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let local = parse_last_status("2024-05-01 10:15:00", est).unwrap();
        let base = parse_last_status("2024-05-01 10:15:00", utc).unwrap();
        assert_eq!(local - base, 5 * 3600);
    }

    #[test]
    fn test_report_is_clean() {
        let mut report = CycleReport {
            token_obtained: true,
            regions_ok: vec![Region::Emea],
            ..Default::default()
        };
        assert!(report.is_clean());
        report.regions_failed.push(Region::Na);
        assert!(!report.is_clean());
    }
}
