//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use agdns_config::ConfigError;
use agdns_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(agdns::connection_failed),
        help(
            "Check network access to the AdGuard DNS API.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(agdns::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(agdns::auth_failed),
        help(
            "The refresh token was rejected. Generate a new one in the AdGuard DNS\n\
             dashboard and store it with: agdns config set-token --profile {profile} <TOKEN>"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No refresh token configured for profile '{profile}'")]
    #[diagnostic(
        code(agdns::no_credentials),
        help(
            "Configure a profile with: agdns config init\n\
             Or set the AGDNS_REFRESH_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(agdns::api_error))]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Poll cycle failed: {message}")]
    #[diagnostic(code(agdns::cycle_failed))]
    CycleFailed { message: String },

    #[error("Failed to clear the query log")]
    #[diagnostic(
        code(agdns::clear_failed),
        help("Run with -v for the API response.")
    )]
    ClearLogFailed,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(agdns::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(agdns::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: agdns config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(agdns::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(agdns::config))]
    Config(Box<ConfigError>),

    #[error("Keyring error: {0}")]
    #[diagnostic(code(agdns::keyring))]
    Keyring(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(agdns::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Keyring(message) => CliError::Keyring(message),
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::AuthRefresh { message, .. } | CoreError::Authentication { message } => {
                CliError::AuthFailed {
                    profile: "current".into(),
                    message,
                }
            }
            CoreError::Api { message, status } => CliError::Api { status, message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::Aggregation { .. }
            | CoreError::Shutdown
            | CoreError::Internal(_)) => CliError::CycleFailed {
                message: other.to_string(),
            },
        }
    }
}
