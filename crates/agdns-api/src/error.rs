use thiserror::Error;

/// Top-level error type for the `agdns-api` crate.
///
/// Covers every failure mode of a single fetch or token exchange.
/// `agdns-core` decides which of these degrade a category and which
/// fail a whole poll cycle.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token endpoint rejected the refresh token, or the exchange
    /// could not be completed. Not recoverable without new credentials.
    #[error("Token refresh failed: {message}")]
    AuthRefresh {
        status: Option<u16>,
        message: String,
    },

    /// The API answered 401 again after a forced token refresh.
    #[error("Request to {endpoint} still unauthorized after token refresh")]
    Unauthorized { endpoint: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Network-level failure: connection refused, DNS failure, timeout.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-auth HTTP failure from a data endpoint.
    #[error("API request failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the token endpoint refused to mint a new token.
    pub fn is_auth_refresh(&self) -> bool {
        matches!(self, Self::AuthRefresh { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthRefresh { status, .. } => *status,
            Self::Unauthorized { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Trim a response body to something safe to put in an error message.
pub(crate) fn preview(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() <= MAX_CHARS {
        body.to_owned()
    } else {
        let mut out: String = body.chars().take(MAX_CHARS).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview("bad gateway"), "bad gateway");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        let out = preview(&body);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));

        let err = Error::Api {
            status: 404,
            body: String::new(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn refresh_rejection_is_not_transient() {
        let err = Error::AuthRefresh {
            status: Some(400),
            message: "invalid_grant".into(),
        };
        assert!(err.is_auth_refresh());
        assert!(!err.is_transient());
    }
}
