// OAuth2 bearer session
//
// Owns the access/refresh token pair and its expiry. Reads are lock-free
// through `ArcSwap`; every refresh runs under a single async mutex so
// concurrent callers that all see a stale token trigger one exchange and
// then reuse its result, whether it succeeded or failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};
use url::Url;

use crate::error::{Error, preview};

/// Tokens are refreshed this long before they expire.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Current bearer session.
///
/// `expires_at == None` means the expiry is unknown, which is treated
/// the same as expired: the next request refreshes first.
#[derive(Debug, Clone)]
pub struct TokenState {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    /// Bumped on every successful refresh.
    pub generation: u64,
}

impl TokenState {
    /// Initial session from stored credentials. The expiry is unknown,
    /// so the first request performs a refresh.
    pub fn new(access_token: SecretString, refresh_token: SecretString) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: None,
            generation: 0,
        }
    }

    /// Same as [`new`](Self::new) but with a known expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether a request issued at `now` must refresh first.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => now >= at - TimeDelta::seconds(REFRESH_MARGIN_SECS),
        }
    }
}

/// Token endpoint settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: Url,
    /// Sent as `client_id` when non-empty.
    pub client_id: String,
    /// Sent space-joined as `scope` when non-empty.
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A rejected exchange. Tasks that queued while it ran get its error
/// back instead of posting the same refresh token again.
#[derive(Debug, Clone)]
struct FailedExchange {
    /// Value of `finished` once this exchange completed.
    finished: u64,
    status: Option<u16>,
    message: String,
}

impl FailedExchange {
    fn to_error(&self) -> Error {
        Error::AuthRefresh {
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Owns the bearer session for one API client.
pub struct TokenManager {
    http: reqwest::Client,
    oauth: OAuthConfig,
    state: ArcSwap<TokenState>,
    /// Serializes exchanges; holds the last one if it failed.
    refresh_lock: Mutex<Option<FailedExchange>>,
    /// Exchanges completed so far, successful or not.
    finished: AtomicU64,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, oauth: OAuthConfig, initial: TokenState) -> Self {
        Self {
            http,
            oauth,
            state: ArcSwap::from_pointee(initial),
            refresh_lock: Mutex::new(None),
            finished: AtomicU64::new(0),
        }
    }

    /// Current session (cheap `Arc` clone).
    pub fn state(&self) -> Arc<TokenState> {
        self.state.load_full()
    }

    /// Return a session that is valid for at least the refresh margin,
    /// refreshing first if necessary.
    pub async fn ensure_valid(&self) -> Result<Arc<TokenState>, Error> {
        let current = self.state();
        if !current.needs_refresh(Utc::now()) {
            return Ok(current);
        }

        let seen = self.finished.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited for the lock.
        let current = self.state();
        if !current.needs_refresh(Utc::now()) {
            return Ok(current);
        }
        if let Some(err) = failed_since(last_failure.as_ref(), seen) {
            return Err(err);
        }
        self.exchange(&current, &mut last_failure).await
    }

    /// Force a refresh after the API rejected `rejected`.
    ///
    /// If the session was already replaced since `rejected` was handed
    /// out, the newer session is returned without another exchange.
    pub async fn refresh_after_rejection(
        &self,
        rejected: &TokenState,
    ) -> Result<Arc<TokenState>, Error> {
        let seen = self.finished.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;
        let current = self.state();
        if current.generation != rejected.generation {
            debug!(
                generation = current.generation,
                "token already refreshed by another request"
            );
            return Ok(current);
        }
        if let Some(err) = failed_since(last_failure.as_ref(), seen) {
            return Err(err);
        }
        self.exchange(&current, &mut last_failure).await
    }

    /// Unconditionally exchange the refresh token for a new session.
    pub async fn refresh(&self) -> Result<Arc<TokenState>, Error> {
        let mut last_failure = self.refresh_lock.lock().await;
        let current = self.state();
        self.exchange(&current, &mut last_failure).await
    }

    /// Run one exchange and record its outcome. Caller holds
    /// `refresh_lock` and passes its contents as `last_failure`.
    async fn exchange(
        &self,
        current: &TokenState,
        last_failure: &mut Option<FailedExchange>,
    ) -> Result<Arc<TokenState>, Error> {
        let outcome = self.post_refresh_grant(current).await;
        let finished = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        *last_failure = match &outcome {
            Err(Error::AuthRefresh { status, message }) => Some(FailedExchange {
                finished,
                status: *status,
                message: message.clone(),
            }),
            _ => None,
        };
        outcome
    }

    /// POST the refresh grant and install the result.
    async fn post_refresh_grant(&self, current: &TokenState) -> Result<Arc<TokenState>, Error> {
        let scope = self.oauth.scopes.join(" ");
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.expose_secret()),
        ];
        if !self.oauth.client_id.is_empty() {
            form.push(("client_id", self.oauth.client_id.as_str()));
        }
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        debug!(url = %self.oauth.token_url, "refreshing access token");

        let resp = self
            .http
            .post(self.oauth.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "network error during token refresh");
                Error::AuthRefresh {
                    status: None,
                    message: format!("network error: {e}"),
                }
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "token refresh rejected");
            return Err(Error::AuthRefresh {
                status: Some(status.as_u16()),
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let body = resp.text().await.map_err(|e| Error::AuthRefresh {
            status: Some(status.as_u16()),
            message: format!("failed to read token response: {e}"),
        })?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::AuthRefresh {
                status: Some(status.as_u16()),
                message: format!("malformed token response: {e}"),
            })?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let next = Arc::new(TokenState {
            access_token: SecretString::from(token.access_token),
            // Servers may keep the refresh token stable and omit it.
            refresh_token: token
                .refresh_token
                .map_or_else(|| current.refresh_token.clone(), SecretString::from),
            expires_at: Some(Utc::now() + TimeDelta::seconds(expires_in)),
            generation: current.generation + 1,
        });
        self.state.store(Arc::clone(&next));

        debug!(
            generation = next.generation,
            expires_in, "access token refreshed"
        );
        Ok(next)
    }
}

/// The error of an exchange that completed after `seen`, if it failed.
fn failed_since(last_failure: Option<&FailedExchange>, seen: u64) -> Option<Error> {
    let failure = last_failure.filter(|f| f.finished > seen)?;
    debug!(
        status = failure.status,
        "token refresh failed while waiting, reusing its error"
    );
    Some(failure.to_error())
}
