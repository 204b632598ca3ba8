//! Shared outbound HTTP client.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the client used for both the token and the report endpoints.
///
/// An explicit `proxy` wins over the environment; with `use_system_proxy`
/// off and no explicit proxy, proxy variables are ignored.
pub fn build_client(cfg: &Config) -> Result<reqwest::Client> {
    let timeout = cfg.request_timeout();
    let accept_invalid_certs = cfg.accept_invalid_certs.unwrap_or(false);

    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(concat!("alertsite-exporter/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(accept_invalid_certs);

    if accept_invalid_certs {
        warn!("Upstream TLS certificate verification is disabled");
    }

    match cfg.proxy.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(proxy) => {
            debug!(proxy, "Using explicit outbound proxy");
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        None if !cfg.use_system_proxy.unwrap_or(true) => {
            debug!("System proxy disabled");
            builder = builder.no_proxy();
        }
        None => {}
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_defaults() {
        build_client(&Config::default()).unwrap();
    }

    #[test]
    fn test_explicit_proxy() {
        let cfg = Config {
            proxy: Some("http://proxy.internal:3128".into()),
            ..Default::default()
        };
        build_client(&cfg).unwrap();
    }

    #[test]
    fn test_invalid_proxy_is_http_error() {
        let cfg = Config {
            proxy: Some("::not a proxy::".into()),
            ..Default::default()
        };
        assert_eq!(build_client(&cfg).unwrap_err().kind(), "http");
    }
}
