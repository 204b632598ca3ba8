//! Per-region site-status retrieval and normalization.
//!
//! One authenticated `GET {base_url}/report-sitestatus` per region. The raw
//! rows are filtered (monitoring enabled, allow-listed, not denied) and turned
//! into [`NormalizedMetric`]s. A non-success HTTP status is not an error: the
//! region simply contributes nothing this cycle.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::credentials::AccessToken;
use crate::error::{ExporterError, Result};
use crate::region::{Region, RegionConfig, TargetFilter};

/// One row of the upstream site-status report.
///
/// Every field is optional and accepts JSON strings, numbers or booleans.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawStatusRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_status_desc: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub monitor: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dt_last_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub resptime_last: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub info_msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportResponse {
    #[serde(default, alias = "Results")]
    results: Option<Vec<RawStatusRecord>>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(if b { "y" } else { "n" }.to_string()),
        _ => None,
    })
}

/// A filtered, alias-normalized target status for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetric {
    pub region: Region,
    pub app: String,
    /// 0 = healthy, 1 = unhealthy.
    pub health: u8,
    /// Only set when unhealthy.
    pub status_desc: Option<String>,
    /// Only set when unhealthy.
    pub info_msg: Option<String>,
    /// Decimal seconds as sent by the upstream; parsed by the poller.
    pub response_time: Option<String>,
    /// `yyyy-MM-dd HH:mm:ss` as sent by the upstream; parsed by the poller.
    pub last_status_at: Option<String>,
}

impl NormalizedMetric {
    pub fn is_healthy(&self) -> bool {
        self.health == 0
    }
}

/// Outcome of a region request that reached the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    /// The upstream answered 401; the token should be renewed.
    TokenRejected,
    /// Any other non-success status.
    UpstreamStatus(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionFetch {
    pub status: FetchStatus,
    pub metrics: Vec<NormalizedMetric>,
}

impl RegionFetch {
    pub fn ok(metrics: Vec<NormalizedMetric>) -> Self {
        Self {
            status: FetchStatus::Ok,
            metrics,
        }
    }

    pub fn failed(status: FetchStatus) -> Self {
        Self {
            status,
            metrics: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// Boundary between the poller and the upstream report API.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Regions to poll, in poll order.
    fn regions(&self) -> Vec<Region>;

    async fn fetch_region(&self, token: &AccessToken, region: Region) -> Result<RegionFetch>;
}

fn is_affirmative(flag: Option<&str>) -> bool {
    matches!(
        flag.map(|f| f.trim().to_ascii_lowercase()).as_deref(),
        Some("y" | "yes" | "true" | "1")
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Applies the region's filters and turns surviving rows into metrics.
pub fn normalize_records(
    region: Region,
    allow: &[String],
    filter: &TargetFilter,
    records: Vec<RawStatusRecord>,
) -> Vec<NormalizedMetric> {
    records
        .into_iter()
        .filter(|r| is_affirmative(r.monitor.as_deref()))
        .filter_map(|r| {
            let name = r.device_name.as_deref()?;
            if !filter.accepts(name, allow) {
                return None;
            }

            let healthy = r.last_status.as_deref().map(str::trim) == Some("0");
            let app = filter.canonical_name(name);

            Some(NormalizedMetric {
                region,
                app,
                health: if healthy { 0 } else { 1 },
                status_desc: if healthy { None } else { non_blank(r.last_status_desc) },
                info_msg: if healthy { None } else { non_blank(r.info_msg) },
                response_time: non_blank(r.resptime_last),
                last_status_at: non_blank(r.dt_last_status),
            })
        })
        .collect()
}

/// HTTP implementation backed by the AlertSite v3 report endpoint.
#[derive(Debug, Clone)]
pub struct AlertSiteClient {
    client: reqwest::Client,
    base_url: String,
    regions: BTreeMap<Region, RegionConfig>,
    filter: TargetFilter,
}

impl AlertSiteClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        regions: BTreeMap<Region, RegionConfig>,
        filter: TargetFilter,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            regions,
            filter,
        }
    }

    fn report_url(&self) -> String {
        format!("{}/report-sitestatus", self.base_url)
    }
}

#[async_trait]
impl StatusSource for AlertSiteClient {
    fn regions(&self) -> Vec<Region> {
        self.regions.keys().copied().collect()
    }

    #[instrument(skip_all, fields(region = %region))]
    async fn fetch_region(&self, token: &AccessToken, region: Region) -> Result<RegionFetch> {
        let cfg = self.regions.get(&region).ok_or_else(|| {
            ExporterError::Configuration(format!("region {} is not configured", region))
        })?;

        let account_id = cfg.account_id.to_string();
        let response = self
            .client
            .get(self.report_url())
            .query(&[
                ("showsubaccounts", "true"),
                ("sub_accounts", account_id.as_str()),
                ("summarize", "true"),
            ])
            .bearer_auth(token.as_str().trim())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ExporterError::Transport { region, source })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(status = status.as_u16(), "Upstream rejected the access token");
            return Ok(RegionFetch::failed(FetchStatus::TokenRejected));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Site status request failed, region skipped");
            return Ok(RegionFetch::failed(FetchStatus::UpstreamStatus(status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|source| ExporterError::Transport { region, source })?;
        let report: ReportResponse =
            serde_json::from_str(&body).map_err(|source| ExporterError::Decode {
                what: "site status report",
                source,
            })?;

        let records = report.results.unwrap_or_default();
        let received = records.len();
        let metrics = normalize_records(region, &cfg.targets, &self.filter, records);
        debug!(received, kept = metrics.len(), "Site status report normalized");

        Ok(RegionFetch::ok(metrics))
    }
}
