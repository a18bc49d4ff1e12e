// AdGuard DNS public API endpoint table.

use std::fmt;

/// Default public API root.
pub const DEFAULT_API_URL: &str = "https://api.adguard-dns.io";

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.adguard-dns.io/oapi/v1/oauth_token";

/// A data endpoint of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    AccountLimits,
    Devices,
    DnsServers,
    StatsTime,
    StatsDomains,
    /// GET lists entries, DELETE clears the log.
    QueryLog,
}

impl Endpoint {
    /// Absolute request path, joined onto the API root.
    pub fn path(self) -> &'static str {
        match self {
            Self::AccountLimits => "/oapi/v1/account/limits",
            Self::Devices => "/oapi/v1/devices",
            Self::DnsServers => "/oapi/v1/dns_servers",
            Self::StatsTime => "/oapi/v1/stats/time",
            Self::StatsDomains => "/oapi/v1/stats/domains",
            Self::QueryLog => "/oapi/v1/query_log",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
