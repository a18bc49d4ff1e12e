// ── Typed category payloads ──
//
// Each category decodes into one of these shapes exactly once, at the
// aggregation boundary. Every shape has a safe empty default that stands
// in when the category could not be fetched. Fields derivation does not
// need are left in the raw JSON, and a `null` decodes like a missing
// field.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::category::Category;

// ── Account limits ───────────────────────────────────────────────────

/// `GET /oapi/v1/account/limits`: a map of limit name to usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountLimits {
    #[serde(flatten)]
    pub entries: BTreeMap<String, Value>,
}

/// One `{used, limit}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub used: u64,
    pub limit: u64,
}

impl AccountLimits {
    /// Entries shaped like `{used, limit}`, in key order. Anything else
    /// is skipped.
    pub fn limits(&self) -> impl Iterator<Item = (&str, Limit)> {
        self.entries.iter().filter_map(|(name, value)| {
            Limit::deserialize(value)
                .ok()
                .map(|limit| (name.as_str(), limit))
        })
    }
}

// ── Devices ──────────────────────────────────────────────────────────

/// `GET /oapi/v1/devices`. Accepts `{"devices": [...]}` or a bare array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceList {
    pub devices: Vec<Device>,
}

impl<'de> Deserialize<'de> for DeviceList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(Vec<Device>),
            Wrapped {
                #[serde(default, deserialize_with = "null_as_default")]
                devices: Vec<Device>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(devices) | Wire::Wrapped { devices } => Self { devices },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub linked_ip: Option<String>,
    pub statistics: Option<DeviceStatistics>,
    pub settings: Option<DeviceSettings>,
}

impl Device {
    /// Devices without an explicit status are treated as active.
    pub fn is_active(&self) -> bool {
        self.status.as_deref().unwrap_or("active") == "active"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceStatistics {
    #[serde(deserialize_with = "null_as_default")]
    pub queries_count: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub blocked_count: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub top_blocked_domains: Vec<DomainCount>,
    #[serde(deserialize_with = "null_as_default")]
    pub top_queried_domains: Vec<DomainCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainCount {
    #[serde(deserialize_with = "null_as_default")]
    pub domain: String,
    #[serde(deserialize_with = "null_as_default")]
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    #[serde(deserialize_with = "null_as_enabled")]
    pub protection_enabled: bool,
    #[serde(deserialize_with = "null_as_enabled")]
    pub safe_browsing_enabled: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub adult_content_enabled: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            protection_enabled: true,
            safe_browsing_enabled: true,
            adult_content_enabled: false,
        }
    }
}

// ── DNS servers ──────────────────────────────────────────────────────

/// `GET /oapi/v1/dns_servers`. Accepts `{"dns_servers": [...]}` or a
/// bare array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DnsServerList {
    pub dns_servers: Vec<DnsServer>,
}

impl<'de> Deserialize<'de> for DnsServerList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(Vec<DnsServer>),
            Wrapped {
                #[serde(default, deserialize_with = "null_as_default")]
                dns_servers: Vec<DnsServer>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(dns_servers) | Wire::Wrapped { dns_servers } => Self { dns_servers },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsServer {
    pub id: Option<String>,
    pub name: Option<String>,
}

// ── Statistics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCounters {
    #[serde(deserialize_with = "null_as_default")]
    pub queries: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub blocked: u64,
}

/// `GET /oapi/v1/stats/time`: time-bucketed query counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStats {
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Vec<TimeBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBucket {
    #[serde(deserialize_with = "null_as_default")]
    pub value: QueryCounters,
}

/// `GET /oapi/v1/stats/domains`: per-domain query counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainStats {
    #[serde(deserialize_with = "null_as_default")]
    pub stats: Vec<DomainBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainBucket {
    pub domain: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub value: QueryCounters,
}

// ── Query log ────────────────────────────────────────────────────────

/// `GET /oapi/v1/query_log`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLog {
    #[serde(alias = "items", deserialize_with = "null_as_default")]
    pub query_log: Vec<QueryLogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogEntry {
    pub status: Option<String>,
}

impl QueryLogEntry {
    pub fn is_blocked(&self) -> bool {
        self.status.as_deref() == Some("blocked")
    }
}

impl QueryLog {
    pub fn blocked_count(&self) -> usize {
        self.query_log.iter().filter(|e| e.is_blocked()).count()
    }
}

// ── Null handling ────────────────────────────────────────────────────

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Toggles that are on unless the API says otherwise.
fn null_as_enabled<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Option::<bool>::deserialize(deserializer).map(|v| v.unwrap_or(true))
}

// ── Tagged union ─────────────────────────────────────────────────────

/// A decoded payload for any category.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    AccountLimits(AccountLimits),
    Devices(DeviceList),
    DnsServers(DnsServerList),
    StatsTime(TimeStats),
    StatsDomains(DomainStats),
    QueryLog(QueryLog),
}

impl Payload {
    /// The safe default for `category`.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::AccountLimits => Self::AccountLimits(AccountLimits::default()),
            Category::Devices => Self::Devices(DeviceList::default()),
            Category::DnsServers => Self::DnsServers(DnsServerList::default()),
            Category::StatsTime => Self::StatsTime(TimeStats::default()),
            Category::StatsDomains => Self::StatsDomains(DomainStats::default()),
            Category::QueryLog => Self::QueryLog(QueryLog::default()),
        }
    }

    /// Decode a raw response body as the shape `category` expects.
    pub fn decode(category: Category, raw: &Value) -> Result<Self, serde_json::Error> {
        Ok(match category {
            Category::AccountLimits => Self::AccountLimits(AccountLimits::deserialize(raw)?),
            Category::Devices => Self::Devices(DeviceList::deserialize(raw)?),
            Category::DnsServers => Self::DnsServers(DnsServerList::deserialize(raw)?),
            Category::StatsTime => Self::StatsTime(TimeStats::deserialize(raw)?),
            Category::StatsDomains => Self::StatsDomains(DomainStats::deserialize(raw)?),
            Category::QueryLog => Self::QueryLog(QueryLog::deserialize(raw)?),
        })
    }

    pub fn category(&self) -> Category {
        match self {
            Self::AccountLimits(_) => Category::AccountLimits,
            Self::Devices(_) => Category::Devices,
            Self::DnsServers(_) => Category::DnsServers,
            Self::StatsTime(_) => Category::StatsTime,
            Self::StatsDomains(_) => Category::StatsDomains,
            Self::QueryLog(_) => Category::QueryLog,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn devices_accept_wrapped_and_bare_shapes() {
        let wrapped = json!({ "devices": [{ "id": "a", "name": "Laptop" }] });
        let bare = json!([{ "id": "a", "name": "Laptop" }]);

        let Payload::Devices(from_wrapped) = Payload::decode(Category::Devices, &wrapped).unwrap()
        else {
            panic!("wrong payload variant");
        };
        let Payload::Devices(from_bare) = Payload::decode(Category::Devices, &bare).unwrap() else {
            panic!("wrong payload variant");
        };
        assert_eq!(from_wrapped, from_bare);
        assert_eq!(from_bare.devices[0].name.as_deref(), Some("Laptop"));
    }

    #[test]
    fn empty_object_decodes_to_default_for_every_category() {
        let empty = json!({});
        for category in Category::ALL {
            let decoded = Payload::decode(category, &empty).unwrap();
            assert_eq!(decoded, Payload::empty(category), "{category}");
            assert_eq!(decoded.category(), category);
        }
    }

    #[test]
    fn device_settings_default_when_missing() {
        let raw = json!({ "id": "a", "settings": { "adult_content_enabled": true } });
        let device: Device = serde_json::from_value(raw).unwrap();
        let settings = device.settings.unwrap();
        assert!(settings.protection_enabled);
        assert!(settings.safe_browsing_enabled);
        assert!(settings.adult_content_enabled);
        assert!(device.is_active());
    }

    #[test]
    fn query_log_accepts_items_alias() {
        let raw = json!({ "items": [{ "status": "blocked" }, { "status": "processed" }] });
        let log: QueryLog = serde_json::from_value(raw).unwrap();
        assert_eq!(log.query_log.len(), 2);
        assert_eq!(log.blocked_count(), 1);
    }

    #[test]
    fn account_limits_skip_non_usage_entries() {
        let raw = json!({
            "devices": { "used": 3, "limit": 10 },
            "dns_servers": { "used": 1, "limit": 5 },
            "plan": "personal"
        });
        let limits: AccountLimits = serde_json::from_value(raw).unwrap();
        let usage: Vec<(&str, Limit)> = limits.limits().collect();
        assert_eq!(
            usage,
            vec![
                ("devices", Limit { used: 3, limit: 10 }),
                ("dns_servers", Limit { used: 1, limit: 5 }),
            ]
        );
    }

    #[test]
    fn nulls_decode_like_missing_fields() {
        let servers = json!([{ "id": "s1", "name": null, "device_ids": null, "default": null }]);
        let Payload::DnsServers(list) = Payload::decode(Category::DnsServers, &servers).unwrap()
        else {
            panic!("wrong payload variant");
        };
        assert_eq!(list.dns_servers.len(), 1);
        assert_eq!(list.dns_servers[0].name, None);

        let stats = json!({ "stats": [
            { "time_millis": null, "value": { "queries": 7, "blocked": null, "companies": null } },
            { "value": null }
        ]});
        let time: TimeStats = serde_json::from_value(stats).unwrap();
        assert_eq!(time.stats[0].value, QueryCounters { queries: 7, blocked: 0 });
        assert_eq!(time.stats[1].value, QueryCounters::default());

        let device = json!({
            "id": "a",
            "statistics": { "queries_count": null, "top_blocked_domains": null },
            "settings": { "protection_enabled": null, "adult_content_enabled": null }
        });
        let device: Device = serde_json::from_value(device).unwrap();
        assert_eq!(device.statistics, Some(DeviceStatistics::default()));
        assert_eq!(device.settings, Some(DeviceSettings::default()));

        assert_eq!(
            Payload::decode(Category::QueryLog, &json!({ "items": null })).unwrap(),
            Payload::empty(Category::QueryLog)
        );
    }

    #[test]
    fn wrong_shape_fails_to_decode() {
        let raw = json!({ "stats": "not a list" });
        assert!(Payload::decode(Category::StatsTime, &raw).is_err());
    }
}
