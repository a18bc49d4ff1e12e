//! Configuration for the agdns coordinator.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `agdns_core::CoordinatorConfig`. The core never reads
//! files; hosts go through this crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agdns_core::config::{
    DEFAULT_QUERY_LOG_LIMIT, DEFAULT_STATS_WINDOW_SECS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_UPDATE_INTERVAL_SECS,
};
use agdns_core::{
    CoordinatorConfig, Credentials, DEFAULT_API_URL, DEFAULT_TOKEN_URL, TlsVerification,
};

const KEYRING_SERVICE: &str = "agdns";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no refresh token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between poll cycles.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            update_interval: default_update_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_SECS
}

/// A named account profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client id sent with refresh requests.
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Access token (plaintext, prefer keyring or env var).
    pub access_token: Option<String>,

    /// Environment variable holding the access token.
    pub access_token_env: Option<String>,

    /// Refresh token (plaintext, prefer keyring or env var).
    pub refresh_token: Option<String>,

    /// Environment variable holding the refresh token.
    pub refresh_token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override request timeout.
    pub timeout: Option<u64>,

    /// Override update interval.
    pub update_interval: Option<u64>,

    pub query_log_limit: Option<u32>,

    /// Trailing window for stats and query-log requests.
    pub stats_window_hours: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_url: default_token_url(),
            client_id: String::new(),
            scopes: Vec::new(),
            access_token: None,
            access_token_env: None,
            refresh_token: None,
            refresh_token_env: None,
            ca_cert: None,
            timeout: None,
            update_interval: None,
            query_log_limit: None,
            stats_window_hours: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "agdns", "agdns").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("agdns");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment overrides use the `AGDNS_` prefix with `__` as the
/// nesting separator, e.g. `AGDNS_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AGDNS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is
/// unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Pick the named profile, falling back to `default_profile`, then
/// `"default"`.
pub fn select_profile<'a>(
    cfg: &'a Config,
    name: Option<&str>,
) -> Result<(String, &'a Profile), ConfigError> {
    let name = name
        .map(str::to_owned)
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into());
    match cfg.profiles.get(&name) {
        Some(profile) => Ok((name, profile)),
        None => Err(ConfigError::UnknownProfile { name }),
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Which token of a profile's pair a keyring entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn key(self) -> &'static str {
        match self {
            Self::Access => "access-token",
            Self::Refresh => "refresh-token",
        }
    }
}

fn keyring_entry(profile_name: &str, kind: TokenKind) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{}", kind.key()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Save a token in the system keyring under `agdns` / `{profile}/{kind}`.
pub fn store_token(profile_name: &str, kind: TokenKind, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, kind)?
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Look a token up in the env var named by the profile, then the system
/// keyring, then the plaintext config value.
fn resolve_secret(
    profile_name: &str,
    kind: TokenKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    // 1. Env var named by the profile
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name, kind) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Resolve the token pair for a profile.
///
/// The refresh token is required. A missing access token is allowed:
/// the coordinator then refreshes before its first request.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let refresh_token = resolve_secret(
        profile_name,
        TokenKind::Refresh,
        profile.refresh_token_env.as_deref(),
        profile.refresh_token.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    let access_token = resolve_secret(
        profile_name,
        TokenKind::Access,
        profile.access_token_env.as_deref(),
        profile.access_token.as_deref(),
    )
    .unwrap_or_else(|| SecretString::from(String::new()));

    Ok(Credentials {
        access_token,
        refresh_token,
        expires_at: None,
    })
}

/// Build a `CoordinatorConfig` from a profile, with `defaults` filling
/// any unset tuning.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let token_url = parse_url("token_url", &profile.token_url)?;
    let credentials = resolve_credentials(profile, profile_name)?;

    let mut config = CoordinatorConfig::new(api_url, token_url, credentials);
    config.client_id.clone_from(&profile.client_id);
    config.scopes.clone_from(&profile.scopes);
    if let Some(ref ca_path) = profile.ca_cert {
        config.tls = TlsVerification::CustomCa(ca_path.clone());
    }
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.update_interval =
        Duration::from_secs(profile.update_interval.unwrap_or(defaults.update_interval));
    config.query_log_limit = profile.query_log_limit.unwrap_or(DEFAULT_QUERY_LOG_LIMIT);
    config.stats_window = profile
        .stats_window_hours
        .map_or(Duration::from_secs(DEFAULT_STATS_WINDOW_SECS), |h| {
            Duration::from_secs(h.saturating_mul(3600))
        });

    config.validate().map_err(|e| ConfigError::Validation {
        field: format!("profile '{profile_name}'"),
        reason: e.to_string(),
    })?;
    Ok(config)
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}
