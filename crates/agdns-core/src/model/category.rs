// ── Data categories ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use agdns_api::Endpoint;

/// One independently fetched subset of remote data.
///
/// The set is fixed; every published snapshot carries all of them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    AccountLimits,
    Devices,
    DnsServers,
    StatsTime,
    StatsDomains,
    QueryLog,
}

impl Category {
    /// All categories in fetch order.
    pub const ALL: [Self; 6] = [
        Self::AccountLimits,
        Self::Devices,
        Self::DnsServers,
        Self::StatsTime,
        Self::StatsDomains,
        Self::QueryLog,
    ];

    /// The API endpoint backing this category.
    pub fn endpoint(self) -> Endpoint {
        match self {
            Self::AccountLimits => Endpoint::AccountLimits,
            Self::Devices => Endpoint::Devices,
            Self::DnsServers => Endpoint::DnsServers,
            Self::StatsTime => Endpoint::StatsTime,
            Self::StatsDomains => Endpoint::StatsDomains,
            Self::QueryLog => Endpoint::QueryLog,
        }
    }

    /// Whether the endpoint takes a `time_from_millis`/`time_to_millis`
    /// window.
    pub fn is_windowed(self) -> bool {
        matches!(self, Self::StatsTime | Self::StatsDomains | Self::QueryLog)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn all_matches_iteration_order() {
        let iterated: Vec<Category> = Category::iter().collect();
        assert_eq!(iterated, Category::ALL.to_vec());
    }

    #[test]
    fn keys_are_snake_case() {
        assert_eq!(Category::StatsTime.to_string(), "stats_time");
        assert_eq!(Category::from_str("account_limits").ok(), Some(Category::AccountLimits));
        assert_eq!(
            serde_json::to_value(Category::QueryLog).ok(),
            Some(serde_json::json!("query_log"))
        );
    }
}
