// ── Snapshots ──
//
// A `RawSnapshot` holds one slot per category and is complete by
// construction: the builder refuses to produce one with a missing slot.
// `Snapshot` adds the derived metrics and is what observers receive.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::category::Category;
use super::payload::{
    AccountLimits, DeviceList, DnsServerList, DomainStats, Payload, QueryLog, TimeStats,
};
use crate::error::CoreError;
use crate::metrics::DerivedMetrics;

// ── Category slot ────────────────────────────────────────────────────

/// One category's result for a cycle.
///
/// `raw` is the response body verbatim, or an empty object when the
/// fetch failed. A body that arrived but could not be decoded is still
/// kept verbatim; only `payload` falls back. Serializes as `raw` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryData<T> {
    pub raw: Value,
    pub payload: T,
    /// Why this category fell back to its default, if it did.
    pub degraded: Option<String>,
}

impl<T> CategoryData<T> {
    pub fn fresh(raw: Value, payload: T) -> Self {
        Self {
            raw,
            payload,
            degraded: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.degraded.is_none()
    }
}

impl<T: Default> CategoryData<T> {
    /// Default payload standing in for a failed fetch or a body that did
    /// not decode.
    pub fn undecodable(raw: Value, reason: impl Into<String>) -> Self {
        Self {
            raw,
            payload: T::default(),
            degraded: Some(reason.into()),
        }
    }
}

impl<T> Serialize for CategoryData<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

// ── Raw snapshot ─────────────────────────────────────────────────────

/// Merged result of one fan-out, before derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSnapshot {
    pub cycle: u64,
    pub fetched_at: DateTime<Utc>,
    pub account_limits: CategoryData<AccountLimits>,
    pub devices: CategoryData<DeviceList>,
    pub dns_servers: CategoryData<DnsServerList>,
    pub stats_time: CategoryData<TimeStats>,
    pub stats_domains: CategoryData<DomainStats>,
    pub query_log: CategoryData<QueryLog>,
}

impl RawSnapshot {
    pub fn builder(cycle: u64, fetched_at: DateTime<Utc>) -> RawSnapshotBuilder {
        RawSnapshotBuilder::new(cycle, fetched_at)
    }

    /// The raw payload stored for `category`.
    pub fn raw(&self, category: Category) -> &Value {
        match category {
            Category::AccountLimits => &self.account_limits.raw,
            Category::Devices => &self.devices.raw,
            Category::DnsServers => &self.dns_servers.raw,
            Category::StatsTime => &self.stats_time.raw,
            Category::StatsDomains => &self.stats_domains.raw,
            Category::QueryLog => &self.query_log.raw,
        }
    }

    /// Degradation reason for `category`, `None` when it was fetched.
    pub fn degraded(&self, category: Category) -> Option<&str> {
        match category {
            Category::AccountLimits => self.account_limits.degraded.as_deref(),
            Category::Devices => self.devices.degraded.as_deref(),
            Category::DnsServers => self.dns_servers.degraded.as_deref(),
            Category::StatsTime => self.stats_time.degraded.as_deref(),
            Category::StatsDomains => self.stats_domains.degraded.as_deref(),
            Category::QueryLog => self.query_log.degraded.as_deref(),
        }
    }

    /// Categories that fell back to defaults this cycle, in fetch order.
    pub fn degraded_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.degraded(*c).is_some())
            .collect()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Collects per-category results in any order.
#[derive(Debug)]
pub struct RawSnapshotBuilder {
    cycle: u64,
    fetched_at: DateTime<Utc>,
    account_limits: Option<CategoryData<AccountLimits>>,
    devices: Option<CategoryData<DeviceList>>,
    dns_servers: Option<CategoryData<DnsServerList>>,
    stats_time: Option<CategoryData<TimeStats>>,
    stats_domains: Option<CategoryData<DomainStats>>,
    query_log: Option<CategoryData<QueryLog>>,
}

impl RawSnapshotBuilder {
    pub fn new(cycle: u64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            fetched_at,
            account_limits: None,
            devices: None,
            dns_servers: None,
            stats_time: None,
            stats_domains: None,
            query_log: None,
        }
    }

    /// Record a successfully fetched and decoded category.
    pub fn fresh(&mut self, payload: Payload, raw: Value) -> Result<&mut Self, CoreError> {
        let category = payload.category();
        match payload {
            Payload::AccountLimits(p) => {
                place(&mut self.account_limits, category, CategoryData::fresh(raw, p))?;
            }
            Payload::Devices(p) => place(&mut self.devices, category, CategoryData::fresh(raw, p))?,
            Payload::DnsServers(p) => {
                place(&mut self.dns_servers, category, CategoryData::fresh(raw, p))?;
            }
            Payload::StatsTime(p) => {
                place(&mut self.stats_time, category, CategoryData::fresh(raw, p))?;
            }
            Payload::StatsDomains(p) => {
                place(&mut self.stats_domains, category, CategoryData::fresh(raw, p))?;
            }
            Payload::QueryLog(p) => {
                place(&mut self.query_log, category, CategoryData::fresh(raw, p))?;
            }
        }
        Ok(self)
    }

    /// Record a category that failed, filling it with its default.
    pub fn degraded(
        &mut self,
        category: Category,
        reason: impl Into<String>,
    ) -> Result<&mut Self, CoreError> {
        self.fallback(category, Value::Object(Map::new()), reason.into())
    }

    /// Record a category whose body arrived but did not decode. The body
    /// is kept as `raw`; the typed payload is the default.
    pub fn undecodable(
        &mut self,
        category: Category,
        raw: Value,
        reason: impl Into<String>,
    ) -> Result<&mut Self, CoreError> {
        self.fallback(category, raw, reason.into())
    }

    fn fallback(
        &mut self,
        category: Category,
        raw: Value,
        reason: String,
    ) -> Result<&mut Self, CoreError> {
        match category {
            Category::AccountLimits => place(
                &mut self.account_limits,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
            Category::Devices => place(
                &mut self.devices,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
            Category::DnsServers => place(
                &mut self.dns_servers,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
            Category::StatsTime => place(
                &mut self.stats_time,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
            Category::StatsDomains => place(
                &mut self.stats_domains,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
            Category::QueryLog => place(
                &mut self.query_log,
                category,
                CategoryData::undecodable(raw, reason),
            )?,
        }
        Ok(self)
    }

    /// Finish the snapshot. Fails if any category was never recorded.
    pub fn build(self) -> Result<RawSnapshot, CoreError> {
        Ok(RawSnapshot {
            cycle: self.cycle,
            fetched_at: self.fetched_at,
            account_limits: require(self.account_limits, Category::AccountLimits)?,
            devices: require(self.devices, Category::Devices)?,
            dns_servers: require(self.dns_servers, Category::DnsServers)?,
            stats_time: require(self.stats_time, Category::StatsTime)?,
            stats_domains: require(self.stats_domains, Category::StatsDomains)?,
            query_log: require(self.query_log, Category::QueryLog)?,
        })
    }
}

fn place<T>(
    slot: &mut Option<CategoryData<T>>,
    category: Category,
    data: CategoryData<T>,
) -> Result<(), CoreError> {
    if slot.is_some() {
        return Err(CoreError::duplicate_category(category));
    }
    *slot = Some(data);
    Ok(())
}

fn require<T>(slot: Option<CategoryData<T>>, category: Category) -> Result<CategoryData<T>, CoreError> {
    slot.ok_or_else(|| CoreError::missing_category(category))
}

// ── Published snapshot ───────────────────────────────────────────────

/// The merged and derived view of one poll cycle.
///
/// Serializes as a single flat map: every category key with its raw
/// payload, the derived metrics, and `degraded_categories`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub raw: RawSnapshot,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
    pub degraded_categories: Vec<Category>,
}

impl Snapshot {
    pub fn new(raw: RawSnapshot, metrics: DerivedMetrics) -> Self {
        let degraded_categories = raw.degraded_categories();
        Self {
            raw,
            metrics,
            degraded_categories,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.raw.cycle
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.raw.fetched_at
    }

    /// Whether any category fell back to its default.
    pub fn is_partial(&self) -> bool {
        !self.degraded_categories.is_empty()
    }

    /// The raw payload stored for `category`.
    pub fn get(&self, category: Category) -> &Value {
        self.raw.raw(category)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn full_builder() -> RawSnapshotBuilder {
        let mut builder = RawSnapshot::builder(1, Utc::now());
        for category in Category::ALL {
            builder.degraded(category, "unreachable").unwrap();
        }
        builder
    }

    #[test]
    fn missing_slot_is_an_aggregation_fault() {
        let mut builder = RawSnapshot::builder(1, Utc::now());
        builder.degraded(Category::Devices, "down").unwrap();
        match builder.build() {
            Err(CoreError::Aggregation { category, .. }) => {
                assert_eq!(category, Some(Category::AccountLimits));
            }
            other => panic!("expected Aggregation, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let mut builder = full_builder();
        let result = builder.fresh(Payload::empty(Category::QueryLog), json!({}));
        assert!(matches!(result, Err(CoreError::Aggregation { .. })));
    }

    #[test]
    fn degraded_slots_hold_empty_objects() {
        let raw = full_builder().build().unwrap();
        for category in Category::ALL {
            assert_eq!(raw.raw(category), &json!({}));
            assert_eq!(raw.degraded(category), Some("unreachable"));
        }
        assert_eq!(raw.degraded_categories(), Category::ALL.to_vec());
    }

    #[test]
    fn undecodable_slot_keeps_body_and_defaults_payload() {
        let body = json!({ "stats": "not a list" });
        let mut builder = RawSnapshot::builder(1, Utc::now());
        builder
            .undecodable(Category::StatsTime, body.clone(), "bad shape")
            .unwrap();
        for category in Category::ALL {
            if category != Category::StatsTime {
                builder.degraded(category, "unreachable").unwrap();
            }
        }
        let raw = builder.build().unwrap();

        assert_eq!(raw.raw(Category::StatsTime), &body);
        assert_eq!(raw.degraded(Category::StatsTime), Some("bad shape"));
        assert!(raw.stats_time.payload.stats.is_empty());
    }

    #[test]
    fn serialized_raw_snapshot_has_every_category_key() {
        let raw = full_builder().build().unwrap();
        let value = serde_json::to_value(&raw).unwrap();
        for category in Category::ALL {
            assert!(value.get(category.to_string()).is_some(), "{category}");
        }
    }
}
