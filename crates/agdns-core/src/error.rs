// ── Core error types ──
//
// Errors that fail a whole poll cycle or a coordinator call. Per-endpoint
// fetch failures never reach this type; the aggregator folds them into
// degraded categories. `From<agdns_api::Error>` maps wire failures onto
// domain variants.

use thiserror::Error;

use crate::model::Category;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Cycle-fatal errors ───────────────────────────────────────────
    #[error("Token refresh failed: {message}")]
    AuthRefresh {
        status: Option<u16>,
        message: String,
    },

    #[error("Snapshot assembly failed: {message}")]
    Aggregation {
        category: Option<Category>,
        message: String,
    },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── API errors ───────────────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Coordinator has been shut down")]
    Shutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error came from the token endpoint. Such failures
    /// need new credentials; retrying on the next tick will not help.
    pub fn is_auth_refresh(&self) -> bool {
        matches!(self, Self::AuthRefresh { .. })
    }

    pub(crate) fn missing_category(category: Category) -> Self {
        Self::Aggregation {
            category: Some(category),
            message: format!("no result recorded for `{category}`"),
        }
    }

    pub(crate) fn duplicate_category(category: Category) -> Self {
        Self::Aggregation {
            category: Some(category),
            message: format!("`{category}` recorded twice in one cycle"),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<agdns_api::Error> for CoreError {
    fn from(err: agdns_api::Error) -> Self {
        match err {
            agdns_api::Error::AuthRefresh { status, message } => {
                CoreError::AuthRefresh { status, message }
            }
            agdns_api::Error::Unauthorized { endpoint } => CoreError::Authentication {
                message: format!("{endpoint} rejected the refreshed token"),
            },
            agdns_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            agdns_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            agdns_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            agdns_api::Error::Api { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            agdns_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
