// agdns-api: Async Rust client for the AdGuard DNS public API

pub mod auth;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod transport;

pub use auth::{OAuthConfig, TokenManager, TokenState};
pub use client::{ApiClient, EndpointResult, Params};
pub use endpoint::{DEFAULT_API_URL, DEFAULT_TOKEN_URL, Endpoint};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
