//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current exporter configuration. The password never appears.

use alertsite_exporter::config::{DEFAULT_BIND_ADDR, DEFAULT_PORT};
use alertsite_exporter::Config;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.health_stats.record_http_request();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{}\n{FOOTER_TEXT}", render_config_text(&state.config)),
    )
}

fn render_config_text(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "ALERTSITE EXPORTER - CONFIGURATION").ok();
    writeln!(out, "==================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(
        out,
        "enable_health:              {}",
        cfg.enable_health.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "UPSTREAM").ok();
    writeln!(out, "--------").ok();
    writeln!(out, "base_url:                   {}", cfg.base_url()).ok();
    writeln!(
        out,
        "username:                   {}",
        cfg.username.as_deref().unwrap_or("not set")
    )
    .ok();
    writeln!(
        out,
        "password:                   {}",
        if cfg.password.is_some() { "set" } else { "not set" }
    )
    .ok();
    writeln!(
        out,
        "proxy:                      {}",
        cfg.proxy.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "use_system_proxy:           {}",
        cfg.use_system_proxy.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "request_timeout:            {} seconds",
        cfg.request_timeout().as_secs()
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "POLLING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "refresh_interval:           {} seconds",
        cfg.refresh_interval().as_secs()
    )
    .ok();
    writeln!(
        out,
        "token_refresh_after:        {} seconds",
        cfg.token_refresh_after().as_secs()
    )
    .ok();
    writeln!(
        out,
        "last_status_utc_offset:     {} minutes",
        cfg.last_status_utc_offset_minutes.unwrap_or(0)
    )
    .ok();
    writeln!(
        out,
        "deny_substrings:            {}",
        cfg.deny_substrings
            .as_ref()
            .map(|d| d.join(", "))
            .unwrap_or_else(|| "UAT".to_string())
    )
    .ok();
    if let Some(aliases) = &cfg.aliases {
        for alias in aliases {
            writeln!(out, "alias:                      {} -> {}", alias.from, alias.to).ok();
        }
    }
    writeln!(out).ok();

    writeln!(out, "REGIONS").ok();
    writeln!(out, "-------").ok();
    for (region, rc) in cfg.regions() {
        writeln!(
            out,
            "{:<10} account {:<8} {} targets: {}",
            region.as_str(),
            rc.account_id,
            rc.targets.len(),
            rc.targets.join(", ")
        )
        .ok();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_never_rendered() {
        let cfg = Config {
            username: Some("svc".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let text = render_config_text(&cfg.redacted());
        assert!(!text.contains("hunter2"));
        assert!(text.contains("password:                   set"));
        assert!(text.contains("EMEA"));
    }
}
