//! Config command implementation.
//!
//! Generates configuration files in various formats.

use alertsite_exporter::config::render_config;
use alertsite_exporter::{Config, ConfigFormat};
use anyhow::Context;
use std::fs;
use std::path::PathBuf;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Yaml => "alertsite-exporter.yaml",
            ConfigFormat::Json => "alertsite-exporter.json",
            ConfigFormat::Toml => "alertsite-exporter.toml",
        }),
    };

    let mut content = render_config(&config, format)?;
    if commented && format == ConfigFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# AlertSite Exporter Configuration
# ================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9433                       # HTTP port
#
# Upstream API
# ------------
# base_url: "https://api.alertsite.com/api/v3"
# username: null                   # Required, or ALERTSITE_USERNAME
# password: null                   # Required, or ALERTSITE_PASSWORD
#
# Polling
# -------
# refresh_interval_secs: 60        # Seconds between poll cycles
# token_refresh_after_secs: 3300   # Renew the access token after this age
# request_timeout_secs: 30         # Per-request timeout
# last_status_utc_offset_minutes: 0 # Zone of upstream timestamps
#
# Outbound Networking
# -------------------
# proxy: null                      # Explicit proxy URL for upstream requests
# use_system_proxy: true           # Honour HTTP(S)_PROXY when no proxy is set
# accept_invalid_certs: false      # Skip upstream certificate verification
#
# Targets
# -------
# deny_substrings: ["UAT"]         # Case-sensitive; matching targets are dropped
# aliases:                         # Case-insensitive name rewrites
#   - from: "Investor Center"
#     to: "Investor Centre"
# regions:                         # EMEA, NA, OCEANIA
#   EMEA:
#     account_id: 24333
#     targets: ["Sphere", "PING"]  # Case-insensitive substrings
#
# Feature Flags
# -------------
# enable_health: true              # Enable /health endpoint
# instance: null                   # Heartbeat label (default: host name)
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false                # Enable HTTPS (default: false)
# tls_cert_path: null              # Path to TLS certificate (PEM format)
# tls_key_path: null               # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
