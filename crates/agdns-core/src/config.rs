// ── Runtime coordinator configuration ──
//
// Describes how to reach the API and how often to poll. Carries
// credentials but never touches disk; `agdns-config` (or any other host)
// builds a `CoordinatorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 60;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_QUERY_LOG_LIMIT: u32 = 1000;
pub const DEFAULT_STATS_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Stored OAuth2 token pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Known expiry of `access_token`. `None` forces a refresh before
    /// the first request.
    pub expires_at: Option<DateTime<Utc>>,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file, PEM.
    CustomCa(PathBuf),
}

/// Everything a `Coordinator` needs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// API root, e.g. `https://api.adguard-dns.io`.
    pub api_url: Url,
    /// OAuth2 token endpoint.
    pub token_url: Url,
    /// Sent with refresh requests when non-empty.
    pub client_id: String,
    pub scopes: Vec<String>,
    pub credentials: Credentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Time between scheduled poll cycles.
    pub update_interval: Duration,
    /// `limit` sent with query-log fetches.
    pub query_log_limit: u32,
    /// Trailing window requested from the stats and query-log endpoints.
    pub stats_window: Duration,
}

impl CoordinatorConfig {
    /// Config with default tuning for the given endpoints and tokens.
    pub fn new(api_url: Url, token_url: Url, credentials: Credentials) -> Self {
        Self {
            api_url,
            token_url,
            client_id: String::new(),
            scopes: Vec::new(),
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            query_log_limit: DEFAULT_QUERY_LOG_LIMIT,
            stats_window: Duration::from_secs(DEFAULT_STATS_WINDOW_SECS),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let secs = self.update_interval.as_secs();
        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS).contains(&secs) {
            return Err(CoreError::Config {
                message: format!(
                    "update interval must be between {MIN_UPDATE_INTERVAL_SECS} and \
                     {MAX_UPDATE_INTERVAL_SECS} seconds, got {secs}"
                ),
            });
        }
        if self.timeout.is_zero() {
            return Err(CoreError::Config {
                message: "request timeout must be non-zero".into(),
            });
        }
        if self.query_log_limit == 0 {
            return Err(CoreError::Config {
                message: "query log limit must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig::new(
            "https://api.adguard-dns.io".parse().unwrap(),
            "https://api.adguard-dns.io/oapi/v1/oauth_token".parse().unwrap(),
            Credentials {
                access_token: SecretString::from("a".to_string()),
                refresh_token: SecretString::from("r".to_string()),
                expires_at: None,
            },
        )
    }

    #[test]
    fn defaults_validate() {
        let cfg = config();
        assert_eq!(cfg.update_interval, Duration::from_secs(300));
        assert_eq!(cfg.query_log_limit, 1000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let mut cfg = config();
        for (secs, ok) in [(59, false), (60, true), (3600, true), (3601, false)] {
            cfg.update_interval = Duration::from_secs(secs);
            assert_eq!(cfg.validate().is_ok(), ok, "{secs}s");
        }
    }

    #[test]
    fn zero_limit_is_rejected() {
        let mut cfg = config();
        cfg.query_log_limit = 0;
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }
}
