//! Shared upstream access credential with single-flight refresh.
//!
//! One `CredentialManager` owns exactly one cached bearer token. Callers get
//! the cached value without any network traffic while it is younger than the
//! refresh threshold. Once it ages out, the first caller takes the refresh
//! lock and issues the token request; everyone arriving while that request is
//! in flight waits on the same lock, re-checks the slot and leaves with the
//! winner's token.
//!
//! The threshold is deliberately shorter than the server-side token lifetime
//! (55 of 60 minutes by default) so the token is renewed before the upstream
//! starts rejecting it.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::error::{ExporterError, Result};

/// Default age after which a cached token is renewed.
pub const DEFAULT_REFRESH_AFTER: Duration = Duration::from_secs(55 * 60);

/// Opaque bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} chars>)", self.0.len())
    }
}

/// Username/password pair posted to the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both parts must be present and non-blank.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username.map(str::trim), password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.trim().is_empty() => Some(Self::new(u, p)),
            _ => None,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Performs the actual token request.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, credentials: &Credentials) -> Result<AccessToken>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// `POST {base_url}/access-tokens` with a JSON credentials body.
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenIssuer {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/access-tokens", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, credentials: &Credentials) -> Result<AccessToken> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(&TokenRequest {
                username: &credentials.username,
                password: credentials.password(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExporterError::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|r| r.access_token)
            .filter(|t| !t.trim().is_empty());

        match token {
            Some(token) => Ok(AccessToken::new(token)),
            None => Err(ExporterError::Authentication {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

/// A token plus the instant it was obtained. Replaced wholesale on refresh.
#[derive(Debug)]
struct Credential {
    token: AccessToken,
    acquired_at: Instant,
}

pub struct CredentialManager {
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    credentials: Option<Credentials>,
    refresh_after: Duration,
    slot: StdRwLock<Option<Arc<Credential>>>,
    refresh_lock: Mutex<()>,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl CredentialManager {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        credentials: Option<Credentials>,
        refresh_after: Duration,
    ) -> Self {
        Self::with_clock(issuer, credentials, refresh_after, Arc::new(SystemClock))
    }

    pub fn with_clock(
        issuer: Arc<dyn TokenIssuer>,
        credentials: Option<Credentials>,
        refresh_after: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            clock,
            credentials,
            refresh_after,
            slot: StdRwLock::new(None),
            refresh_lock: Mutex::new(()),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Returns a fresh token, refreshing at most once across all concurrent
    /// callers when the cached one is missing or stale.
    pub async fn get_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we were waiting.
        if let Some(token) = self.fresh_token() {
            debug!("Token refreshed by a concurrent caller, reusing it");
            return Ok(token);
        }

        self.refresh_locked(&guard).await
    }

    /// Refreshes unconditionally, e.g. after the upstream rejected the token.
    pub async fn force_refresh(&self) -> Result<AccessToken> {
        let guard = self.refresh_lock.lock().await;
        self.refresh_locked(&guard).await
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn refresh_failure_count(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Age of the cached token, if any.
    pub fn cached_age(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.cached()
            .map(|c| now.saturating_duration_since(c.acquired_at))
    }

    fn cached(&self) -> Option<Arc<Credential>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_token(&self) -> Option<AccessToken> {
        let credential = self.cached()?;
        let age = self.clock.now().saturating_duration_since(credential.acquired_at);
        (age < self.refresh_after).then(|| credential.token.clone())
    }

    /// Caller must hold the refresh lock; the guard parameter proves it.
    #[instrument(skip_all)]
    async fn refresh_locked(&self, _guard: &MutexGuard<'_, ()>) -> Result<AccessToken> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExporterError::Configuration("upstream username/password are not configured".into())
        })?;

        debug!(username = %credentials.username, "Requesting new access token");
        let token = match self.issuer.issue(credentials).await {
            Ok(token) => token,
            Err(e) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, kind = e.kind(), "Access token refresh failed");
                return Err(e);
            }
        };

        let credential = Arc::new(Credential {
            token: token.clone(),
            acquired_at: self.clock.now(),
        });
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        let total = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;

        info!(refreshes = total, "Access token refreshed");
        Ok(token)
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("credentials", &self.credentials)
            .field("refresh_after", &self.refresh_after)
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}
