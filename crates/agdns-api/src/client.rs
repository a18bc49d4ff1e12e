// AdGuard DNS API HTTP client
//
// Wraps `reqwest::Client` with bearer-token injection and the
// single-retry-on-401 discipline. Every request first asks the
// `TokenManager` for a valid session; a 401 forces exactly one refresh
// and one retry.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::auth::{OAuthConfig, TokenManager, TokenState};
use crate::endpoint::Endpoint;
use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// Outcome of a single endpoint fetch: the parsed JSON body, or the
/// reason it could not be obtained.
pub type EndpointResult = Result<serde_json::Value, Error>;

/// Query parameters for a fetch.
pub type Params = [(&'static str, String)];

/// Authenticated client for the AdGuard DNS public API.
///
/// Cheaply cloneable; clones share the connection pool and the bearer
/// session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// Build a client and its token manager from a transport config.
    pub fn new(
        base_url: Url,
        oauth: OAuthConfig,
        initial: TokenState,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, oauth, initial))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// A path on `base_url` (e.g. a reverse-proxy prefix) is kept in front
    /// of every endpoint path.
    pub fn with_client(
        http: reqwest::Client,
        mut base_url: Url,
        oauth: OAuthConfig,
        initial: TokenState,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let dir = format!("{}/", base_url.path());
            base_url.set_path(&dir);
        }
        let tokens = Arc::new(TokenManager::new(http.clone(), oauth, initial));
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// The bearer session shared by every request of this client.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    fn url(&self, endpoint: Endpoint) -> Result<Url, Error> {
        // Relative join, so the root's own path survives.
        Ok(self.base_url.join(endpoint.path().trim_start_matches('/'))?)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// GET `endpoint` and return its JSON body.
    ///
    /// Only HTTP 200 counts as success. A 401 triggers one forced token
    /// refresh and one retry; any other status is returned as
    /// [`Error::Api`] without retrying.
    pub async fn fetch(&self, endpoint: Endpoint, params: &Params) -> EndpointResult {
        let url = self.url(endpoint)?;
        let resp = self.send_authorized(Method::GET, endpoint, url, params).await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            warn!(%endpoint, status = status.as_u16(), "API request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// DELETE `endpoint`. 200 and 204 both count as success.
    pub async fn delete(&self, endpoint: Endpoint) -> Result<(), Error> {
        let url = self.url(endpoint)?;
        let resp = self
            .send_authorized(Method::DELETE, endpoint, url, &[])
            .await?;

        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::Api {
                status: status.as_u16(),
                body: preview(&body),
            })
        }
    }

    /// Send with a valid bearer token, retrying once after a 401.
    ///
    /// Returns the response for any status other than a second 401.
    async fn send_authorized(
        &self,
        method: Method,
        endpoint: Endpoint,
        url: Url,
        params: &Params,
    ) -> Result<reqwest::Response, Error> {
        let session = self.tokens.ensure_valid().await?;
        let resp = self
            .send(method.clone(), url.clone(), params, &session)
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(%endpoint, "401 received, refreshing token and retrying once");
        let session = self.tokens.refresh_after_rejection(&session).await?;
        let retry = self.send(method, url, params, &session).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(%endpoint, "still unauthorized after token refresh");
            return Err(Error::Unauthorized {
                endpoint: endpoint.path().to_owned(),
            });
        }
        Ok(retry)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        params: &Params,
        session: &TokenState,
    ) -> Result<reqwest::Response, Error> {
        use secrecy::ExposeSecret;

        debug!("{method} {url}");
        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(session.access_token.expose_secret());
        if !params.is_empty() {
            builder = builder.query(params);
        }
        Ok(builder.send().await?)
    }
}
