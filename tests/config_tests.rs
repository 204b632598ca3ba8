//! Integration tests for configuration loading and validation.

use alertsite_exporter::config::{load_config, render_config, validate_effective_config};
use alertsite_exporter::{Config, ConfigFormat, Region};
use std::io::Write;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = write_config(
        ".yaml",
        r#"
port: 9555
username: svc-monitor
password: s3cret
refresh_interval_secs: 30
deny_substrings: ["UAT", "STAGING"]
aliases:
  - from: "Investor Center"
    to: "Investor Centre"
regions:
  EMEA:
    account_id: 24333
    targets: ["Sphere", "PING"]
  OCEANIA:
    account_id: 24334
    targets: ["IC ANZ"]
"#,
    );

    let cfg = load_config(Some(file.path())).unwrap();
    validate_effective_config(&cfg).unwrap();

    assert_eq!(cfg.port, Some(9555));
    assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
    assert!(cfg.credentials().is_some());

    let regions = cfg.regions();
    assert_eq!(regions.keys().copied().collect::<Vec<_>>(), vec![Region::Emea, Region::Oceania]);

    let filter = cfg.filter().unwrap();
    assert!(filter.is_denied("Sphere STAGING"));
    assert_eq!(filter.canonical_name("investor center AU "), "Investor Centre AU");
}

#[test]
fn test_load_toml_file() {
    let file = write_config(
        ".toml",
        r#"
port = 9556
refresh_interval_secs = 45

[regions.NA]
account_id = 24332
targets = ["GEMS"]
"#,
    );

    let cfg = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.port, Some(9556));
    assert_eq!(cfg.regions()[&Region::Na].targets, vec!["GEMS".to_string()]);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let err = load_config(Some(std::path::Path::new("/nonexistent/alertsite.yaml"))).unwrap_err();
    assert_eq!(err.kind(), "configuration");
}

#[test]
fn test_malformed_file_is_format_error() {
    let file = write_config(".json", "{ not json");
    let err = load_config(Some(file.path())).unwrap_err();
    assert_eq!(err.kind(), "config_format");
}

#[test]
fn test_unknown_region_key_rejected() {
    let file = write_config(
        ".yaml",
        "regions:\n  APAC:\n    account_id: 1\n    targets: [x]\n",
    );
    assert!(load_config(Some(file.path())).is_err());
}

#[test]
fn test_missing_credentials_are_valid_config() {
    // Credentials surface as a refresh error at runtime, not a validation error.
    let cfg = Config::default();
    validate_effective_config(&cfg).unwrap();
    assert!(cfg.credentials().is_none());
}

#[test]
fn test_blank_password_is_not_a_credential() {
    let cfg = Config {
        username: Some("svc".into()),
        password: Some("   ".into()),
        ..Default::default()
    };
    assert!(cfg.credentials().is_none());
}

#[test]
fn test_tls_files_must_exist_and_be_non_empty() {
    let cert = write_config(".pem", "-----BEGIN CERTIFICATE-----\n");
    let empty_key = write_config(".pem", "");

    let cfg = Config {
        enable_tls: Some(true),
        tls_cert_path: Some(cert.path().to_string_lossy().to_string()),
        tls_key_path: Some(empty_key.path().to_string_lossy().to_string()),
        ..Default::default()
    };
    let err = validate_effective_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("TLS private key file is empty"));

    let cfg = Config {
        tls_key_path: Some("/nonexistent/key.pem".into()),
        ..cfg
    };
    let err = validate_effective_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("TLS private key file not found"));
}

#[test]
fn test_rendered_config_never_contains_password() {
    let cfg = Config {
        password: Some("hunter2".into()),
        ..Default::default()
    };
    for format in [ConfigFormat::Yaml, ConfigFormat::Json] {
        let text = render_config(&cfg.redacted(), format).unwrap();
        assert!(!text.contains("hunter2"));
    }
}
