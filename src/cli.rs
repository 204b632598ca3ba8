//! CLI arguments and subcommands for alertsite-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands, and merges CLI overrides into
//! the loaded configuration.

use alertsite_exporter::config::load_config;
use alertsite_exporter::{Config, ConfigFormat};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Output of the `test` subcommand
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TestOutput {
    /// Per-cycle report
    Summary,
    /// Rendered Prometheus text
    Exposition,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "alertsite-exporter",
    about = "Prometheus exporter for AlertSite site-status health",
    long_about = "Prometheus exporter for AlertSite site-status health.\n\n\
                  Polls the AlertSite v3 report API per region on a fixed interval and \
                  republishes each monitored target as health, status code and error \
                  category gauges.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// AlertSite API user
    #[arg(long, env = "ALERTSITE_USERNAME")]
    pub username: Option<String>,

    /// AlertSite API password
    #[arg(long, env = "ALERTSITE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// AlertSite API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Seconds between poll cycles
    #[arg(long)]
    pub refresh_interval: Option<u64>,

    /// Outbound proxy URL for upstream requests
    #[arg(long)]
    pub proxy: Option<String>,

    /// Ignore proxy environment variables
    #[arg(long)]
    pub no_system_proxy: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and upstream access
    Check {
        /// Also request an access token from the upstream
        #[arg(long)]
        auth: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run a single poll cycle against the upstream
    Test {
        /// Output format
        #[arg(long, value_enum, default_value = "summary")]
        format: TestOutput,
    },
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> alertsite_exporter::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Upstream access
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(secs) = args.refresh_interval {
        config.refresh_interval_secs = Some(secs);
    }
    if let Some(proxy) = &args.proxy {
        config.proxy = Some(proxy.clone());
    }
    if args.no_system_proxy {
        config.use_system_proxy = Some(false);
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_values() {
        let args = Args::parse_from([
            "alertsite-exporter",
            "--no-config",
            "--port",
            "9999",
            "--username",
            "svc",
            "--password",
            "pw",
            "--refresh-interval",
            "15",
            "--no-system-proxy",
        ]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.port, Some(9999));
        assert_eq!(cfg.refresh_interval_secs, Some(15));
        assert_eq!(cfg.use_system_proxy, Some(false));
        assert!(cfg.credentials().is_some());
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = Args::parse_from(["alertsite-exporter", "test", "--format", "exposition"]);
        assert!(matches!(
            args.command,
            Some(Commands::Test {
                format: TestOutput::Exposition
            })
        ));
    }
}
