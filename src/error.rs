//! Error types for the exporter core.
//!
//! Every failure the poll loop can observe maps onto one variant here. None
//! of them is allowed to terminate the loop; the variant decides whether a
//! failure is cycle-wide (credentials), region-wide (transport) or local to
//! a single gauge (parse errors never reach this type at all).

use thiserror::Error;

use crate::region::Region;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    /// Required configuration is missing or malformed. Never triggers a
    /// network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint refused the credentials or answered without a token.
    #[error("authentication failed (status {status}): {body}")]
    Authentication { status: u16, body: String },

    /// A region request could not be completed.
    #[error("transport error for region {region}: {source}")]
    Transport {
        region: Region,
        #[source]
        source: reqwest::Error,
    },

    /// Failure while talking to a non-region endpoint or building the client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body did not match the expected JSON shape.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A gauge write was rejected, e.g. a label count mismatch.
    #[error("failed to write gauge {gauge}: {source}")]
    GaugeWrite {
        gauge: &'static str,
        #[source]
        source: prometheus::Error,
    },

    /// The metric registry could not be serialized.
    #[error("render error: {0}")]
    Render(#[from] prometheus::Error),

    /// The published snapshot could not be read.
    #[error("snapshot unavailable")]
    SnapshotUnavailable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl ExporterError {
    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ExporterError::Configuration(_) => "configuration",
            ExporterError::Authentication { .. } => "authentication",
            ExporterError::Transport { .. } => "transport",
            ExporterError::Http(_) => "http",
            ExporterError::Decode { .. } => "decode",
            ExporterError::GaugeWrite { .. } => "gauge_write",
            ExporterError::Render(_) => "render",
            ExporterError::SnapshotUnavailable => "snapshot",
            ExporterError::Io(_) => "io",
            ExporterError::Yaml(_)
            | ExporterError::Json(_)
            | ExporterError::TomlDe(_)
            | ExporterError::TomlSer(_) => "config_format",
        }
    }
}
