//! Configuration management for alertsite-exporter.
//!
//! This module handles loading, validating and rendering configuration.
//! Files may be YAML, JSON or TOML. CLI overrides are merged by the binary.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::credentials::Credentials;
use crate::error::{ExporterError, Result};
use crate::region::{
    default_aliases, default_deny_substrings, default_regions, AliasRule, Region, RegionConfig,
    TargetFilter,
};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9433;
pub const DEFAULT_BASE_URL: &str = "https://api.alertsite.com/api/v3";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TOKEN_REFRESH_AFTER_SECS: u64 = 3300;
/// Server-side lifetime of an upstream access token.
pub const TOKEN_LIFETIME_SECS: u64 = 3600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Locations tried, in order, when no config file is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/alertsite-exporter/config.yaml",
    "/etc/alertsite-exporter/config.yml",
    "/etc/alertsite-exporter/config.json",
    "./alertsite-exporter.yaml",
    "./alertsite-exporter.yml",
    "./alertsite-exporter.json",
];

const REDACTED: &str = "********";

/// Output format for rendered configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Upstream API
    #[serde(alias = "base-url")]
    pub base_url: Option<String>,
    #[serde(alias = "Username")]
    pub username: Option<String>,
    #[serde(alias = "Password")]
    pub password: Option<String>,

    // Polling
    #[serde(alias = "refresh-interval-secs")]
    pub refresh_interval_secs: Option<u64>,
    #[serde(alias = "token-refresh-after-secs")]
    pub token_refresh_after_secs: Option<u64>,
    #[serde(alias = "request-timeout-secs")]
    pub request_timeout_secs: Option<u64>,

    // Outbound networking
    pub proxy: Option<String>,
    #[serde(alias = "use-system-proxy")]
    pub use_system_proxy: Option<bool>,
    #[serde(alias = "accept-invalid-certs")]
    pub accept_invalid_certs: Option<bool>,

    /// Heartbeat `instance` label; defaults to the host name.
    pub instance: Option<String>,

    // Target filtering
    #[serde(alias = "deny-substrings")]
    pub deny_substrings: Option<Vec<String>>,
    #[serde(alias = "last-status-utc-offset-minutes")]
    pub last_status_utc_offset_minutes: Option<i32>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // TLS/SSL configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Tables last so TOML output stays valid
    pub aliases: Option<Vec<AliasRule>>,
    pub regions: Option<BTreeMap<Region, RegionConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            username: None,
            password: None,
            refresh_interval_secs: Some(DEFAULT_REFRESH_INTERVAL_SECS),
            token_refresh_after_secs: Some(DEFAULT_TOKEN_REFRESH_AFTER_SECS),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            proxy: None,
            use_system_proxy: Some(true),
            accept_invalid_certs: Some(false),
            instance: None,
            deny_substrings: Some(default_deny_substrings()),
            last_status_utc_offset_minutes: Some(0),
            enable_health: Some(true),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            aliases: Some(default_aliases()),
            regions: Some(default_regions()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("token_refresh_after_secs", &self.token_refresh_after_secs)
            .field("regions", &self.regions.as_ref().map(|r| r.len()))
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        )
    }

    pub fn token_refresh_after(&self) -> Duration {
        Duration::from_secs(
            self.token_refresh_after_secs
                .unwrap_or(DEFAULT_TOKEN_REFRESH_AFTER_SECS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Configured regions, or the built-in table when the key is absent.
    pub fn regions(&self) -> BTreeMap<Region, RegionConfig> {
        self.regions.clone().unwrap_or_else(default_regions)
    }

    pub fn filter(&self) -> Result<TargetFilter> {
        let deny = self
            .deny_substrings
            .clone()
            .unwrap_or_else(default_deny_substrings);
        let aliases = self.aliases.clone().unwrap_or_else(default_aliases);
        TargetFilter::new(&deny, &aliases)
    }

    /// `None` unless both username and password are set and non-blank.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.username.as_deref(), self.password.as_deref())
    }

    pub fn status_offset(&self) -> Result<FixedOffset> {
        let minutes = self.last_status_utc_offset_minutes.unwrap_or(0);
        FixedOffset::east_opt(minutes.saturating_mul(60)).ok_or_else(|| {
            ExporterError::Configuration(format!(
                "last_status_utc_offset_minutes {} is out of range",
                minutes
            ))
        })
    }

    /// Heartbeat instance label: configured value, host name, or a fixed name.
    pub fn instance(&self) -> String {
        if let Some(instance) = self.instance.as_deref().filter(|s| !s.trim().is_empty()) {
            return instance.trim().to_string();
        }
        nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "alertsite-exporter".to_string())
    }

    /// Copy safe to print or serve: the password is masked.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if copy.password.is_some() {
            copy.password = Some(REDACTED.to_string());
        }
        copy
    }
}

fn invalid(msg: impl Into<String>) -> ExporterError {
    ExporterError::Configuration(msg.into())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if let Some(bind) = cfg.bind.as_deref() {
        bind.parse::<IpAddr>()
            .map_err(|e| invalid(format!("Invalid bind address '{}': {}", bind, e)))?;
    }

    // Timing values must be positive
    for (key, value) in [
        ("refresh_interval_secs", cfg.refresh_interval_secs),
        ("token_refresh_after_secs", cfg.token_refresh_after_secs),
        ("request_timeout_secs", cfg.request_timeout_secs),
    ] {
        if value == Some(0) {
            return Err(invalid(format!("{} must be greater than 0", key)));
        }
    }

    if let Some(secs) = cfg.token_refresh_after_secs {
        if secs >= TOKEN_LIFETIME_SECS {
            return Err(invalid(format!(
                "token_refresh_after_secs ({}) must be less than the {}s token lifetime",
                secs, TOKEN_LIFETIME_SECS
            )));
        }
    }

    reqwest::Url::parse(cfg.base_url())
        .map_err(|e| invalid(format!("Invalid base_url '{}': {}", cfg.base_url(), e)))?;

    if let Some(proxy) = cfg.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        reqwest::Proxy::all(proxy)
            .map_err(|e| invalid(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    cfg.status_offset()?;
    cfg.filter()?;

    let regions = cfg.regions();
    if regions.is_empty() {
        return Err(invalid("At least one region must be configured"));
    }
    for (region, rc) in &regions {
        if rc.account_id == 0 {
            return Err(invalid(format!("Region {} has no account_id", region)));
        }
        if rc.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(invalid(format!(
                "Region {} has no target allow-list entries",
                region
            )));
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        match (cfg.tls_cert_path.as_deref(), cfg.tls_key_path.as_deref()) {
            (None, None) => {
                return Err(invalid(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set",
                ));
            }
            (Some(_), None) => {
                return Err(invalid("TLS is enabled but tls_key_path is not set"));
            }
            (None, Some(_)) => {
                return Err(invalid("TLS is enabled but tls_cert_path is not set"));
            }
            (Some(cert), Some(key)) => {
                check_tls_file(cert, "certificate")?;
                check_tls_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_tls_file(path: &str, what: &str) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(invalid(format!("TLS {} file is empty: {}", what, path))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(invalid(format!("TLS {} file not found: {}", what, path)))
        }
        Err(e) => Err(invalid(format!(
            "TLS {} file is not readable: {} ({})",
            what, path, e
        ))),
    }
}

/// Loads the given file, else the first existing default path, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(invalid(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, format_for_path(&path))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// File format implied by the extension; YAML unless `.json` or `.toml`.
pub fn format_for_path(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => ConfigFormat::Json,
        Some("toml") => ConfigFormat::Toml,
        _ => ConfigFormat::Yaml,
    }
}

pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config> {
    Ok(match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    })
}

pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Prints the configuration, password redacted, in the requested format.
pub fn show_config(config: &Config, format: ConfigFormat, user_config: bool) -> Result<()> {
    let output = render_config(&config.redacted(), format)?;
    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        validate_effective_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_defaults_carry_no_credentials() {
        let cfg = Config::default();
        assert!(cfg.username.is_none());
        assert!(cfg.password.is_none());
        assert!(cfg.credentials().is_none());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cfg = Config {
            refresh_interval_secs: Some(0),
            ..Default::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("refresh_interval_secs"));
    }

    #[test]
    fn test_region_without_targets_rejected() {
        let mut regions = BTreeMap::new();
        regions.insert(
            Region::Na,
            RegionConfig {
                account_id: 24332,
                targets: vec![],
            },
        );
        let cfg = Config {
            regions: Some(regions),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_empty_region_table_rejected() {
        let cfg = Config {
            regions: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_bad_urls_rejected() {
        let cfg = Config {
            base_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_tls_requires_both_paths() {
        let cfg = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/tmp/cert.pem".into()),
            ..Default::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("tls_key_path"));
    }

    #[test]
    fn test_offset_out_of_range() {
        let cfg = Config {
            last_status_utc_offset_minutes: Some(24 * 60),
            ..Default::default()
        };
        assert!(cfg.status_offset().is_err());

        let cfg = Config {
            last_status_utc_offset_minutes: Some(-300),
            ..Default::default()
        };
        assert_eq!(cfg.status_offset().unwrap().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_redacted_masks_password_only() {
        let cfg = Config {
            username: Some("svc".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let red = cfg.redacted();
        assert_eq!(red.username.as_deref(), Some("svc"));
        assert_eq!(red.password.as_deref(), Some(REDACTED));
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }

    #[test]
    fn test_pascal_case_credential_keys() {
        let cfg = parse_config(
            "Username: svc\nPassword: secret\nregions:\n  EMEA:\n    customer_id: 1\n    filters: [Sphere]\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(cfg.username.as_deref(), Some("svc"));
        assert!(cfg.credentials().is_some());
        let regions = cfg.regions();
        assert_eq!(regions[&Region::Emea].account_id, 1);
        assert_eq!(regions[&Region::Emea].targets, vec!["Sphere".to_string()]);
    }

    #[test]
    fn test_json_config() {
        let cfg = parse_config(
            r#"{"refresh_interval_secs": 15, "regions": {"NA": {"account_id": 7, "targets": ["GEMS"]}}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(15));
        assert_eq!(cfg.regions().len(), 1);
        // Absent keys fall back to defaults.
        assert_eq!(cfg.token_refresh_after(), Duration::from_secs(3300));
    }

    #[test]
    fn test_refresh_threshold_must_precede_token_expiry() {
        let mut cfg = Config {
            token_refresh_after_secs: Some(TOKEN_LIFETIME_SECS),
            ..Default::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("token_refresh_after_secs (3600)"));

        cfg.token_refresh_after_secs = Some(TOKEN_LIFETIME_SECS - 1);
        validate_effective_config(&cfg).unwrap();
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(format_for_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(format_for_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(format_for_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(format_for_path(Path::new("a")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_render_yaml_round_trips_regions() {
        let text = render_config(&Config::default(), ConfigFormat::Yaml).unwrap();
        let back = parse_config(&text, ConfigFormat::Yaml).unwrap();
        assert_eq!(back.regions(), default_regions());
    }
}
