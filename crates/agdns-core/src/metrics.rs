// ── Metric derivation ──
//
// Pure functions from a `RawSnapshot` to the derived fields published
// alongside it. No I/O, no clock reads: the same input always yields
// the same output, down to the serialized bytes.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;
use strum::Display;

use crate::model::{Device, DomainCount, RawSnapshot, Snapshot};

/// Rankings keep this many domains.
pub const TOP_N: usize = 10;

// ── Derived types ────────────────────────────────────────────────────

/// A domain and its summed count across every source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRank {
    pub domain: String,
    pub count: u64,
}

/// Which data produced `protection_enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProtectionSignal {
    /// Blocked entries were (or were not) seen in the recent query log.
    QueryLog,
    /// No usable signal; protection assumed on.
    Default,
}

/// Per-device view, one per entry in `devices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: Option<String>,
    pub name: String,
    pub connected: bool,
    pub linked_ip: Option<String>,
    pub queries_count: u64,
    pub blocked_count: u64,
    pub blocked_percentage: f64,
    pub protection_enabled: bool,
    pub safe_browsing_enabled: bool,
    pub adult_content_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSummary {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
}

/// Everything computed from a raw snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub blocked_percentage: f64,
    pub top_blocked_domain: Option<DomainRank>,
    pub top_queried_domain: Option<DomainRank>,
    pub top_blocked: Vec<DomainRank>,
    pub top_queried: Vec<DomainRank>,
    pub protection_enabled: bool,
    pub protection_signal: ProtectionSignal,
    pub recent_queries: u64,
    pub recent_blocked: u64,
    pub recent_block_rate: f64,
    pub active_devices: u64,
    pub device_summaries: Vec<DeviceSummary>,
    pub dns_server_count: u64,
    pub account_usage: BTreeMap<String, UsageSummary>,
}

impl DerivedMetrics {
    pub fn compute(raw: &RawSnapshot) -> Self {
        let (total_queries, blocked_queries) = raw
            .stats_time
            .payload
            .stats
            .iter()
            .fold((0_u64, 0_u64), |(total, blocked), bucket| {
                (
                    total.saturating_add(bucket.value.queries),
                    blocked.saturating_add(bucket.value.blocked),
                )
            });

        let devices = &raw.devices.payload.devices;
        let statistics = || devices.iter().filter_map(|d| d.statistics.as_ref());
        let top_blocked = rank_domains(statistics().map(|s| s.top_blocked_domains.as_slice()));
        let top_queried = rank_domains(statistics().map(|s| s.top_queried_domains.as_slice()));

        let log = &raw.query_log.payload;
        let recent_queries = to_u64(log.query_log.len());
        let recent_blocked = to_u64(log.blocked_count());
        let (protection_enabled, protection_signal) =
            if raw.query_log.is_fresh() && recent_queries > 0 {
                (recent_blocked > 0, ProtectionSignal::QueryLog)
            } else {
                (true, ProtectionSignal::Default)
            };

        let account_usage = raw
            .account_limits
            .payload
            .limits()
            .map(|(name, limit)| {
                (
                    name.to_owned(),
                    UsageSummary {
                        used: limit.used,
                        limit: limit.limit,
                        percentage: percentage(limit.used, limit.limit),
                    },
                )
            })
            .collect();

        Self {
            total_queries,
            blocked_queries,
            blocked_percentage: percentage(blocked_queries, total_queries),
            top_blocked_domain: top_blocked.first().cloned(),
            top_queried_domain: top_queried.first().cloned(),
            top_blocked,
            top_queried,
            protection_enabled,
            protection_signal,
            recent_queries,
            recent_blocked,
            recent_block_rate: percentage(recent_blocked, recent_queries),
            active_devices: to_u64(devices.len()),
            device_summaries: devices.iter().map(summarize_device).collect(),
            dns_server_count: to_u64(raw.dns_servers.payload.dns_servers.len()),
            account_usage,
        }
    }
}

/// Attach derived metrics to a raw snapshot.
pub fn derive(raw: RawSnapshot) -> Snapshot {
    let metrics = DerivedMetrics::compute(&raw);
    Snapshot::new(raw, metrics)
}

// ── Helpers ──────────────────────────────────────────────────────────

/// `part / whole` as a percentage rounded to two decimals, clamped to
/// `[0, 100]`. Zero when `whole` is zero.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let ratio = (part as f64 / whole as f64) * 100.0;
    round2(ratio.clamp(0.0, 100.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Sum counts per domain over every list, then rank descending.
///
/// Accumulation keeps first-seen order and the sort is stable, so ties
/// rank in the order the domains were first encountered.
fn rank_domains<'a>(lists: impl Iterator<Item = &'a [DomainCount]>) -> Vec<DomainRank> {
    let mut totals: IndexMap<&str, u64> = IndexMap::new();
    for entry in lists.flatten() {
        if entry.domain.is_empty() {
            continue;
        }
        let total = totals.entry(entry.domain.as_str()).or_default();
        *total = total.saturating_add(entry.count);
    }

    let mut ranked: Vec<DomainRank> = totals
        .into_iter()
        .map(|(domain, count)| DomainRank {
            domain: domain.to_owned(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_N);
    ranked
}

fn summarize_device(device: &Device) -> DeviceSummary {
    let (queries_count, blocked_count) = device
        .statistics
        .as_ref()
        .map_or((0, 0), |s| (s.queries_count, s.blocked_count));
    let settings = device.settings.unwrap_or_default();
    DeviceSummary {
        id: device.id.clone(),
        name: device.name.clone().unwrap_or_else(|| "Unknown".into()),
        connected: device.is_active(),
        linked_ip: device.linked_ip.clone(),
        queries_count,
        blocked_count,
        blocked_percentage: percentage(blocked_count, queries_count),
        protection_enabled: settings.protection_enabled,
        safe_browsing_enabled: settings.safe_browsing_enabled,
        adult_content_enabled: settings.adult_content_enabled,
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::model::{Category, Payload};

    // ── Helpers ──────────────────────────────────────────────────────

    /// Raw snapshot with the given categories fetched and the rest
    /// degraded.
    fn raw_with(fetched: &[(Category, Value)]) -> RawSnapshot {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut builder = RawSnapshot::builder(7, at);
        for category in Category::ALL {
            match fetched.iter().find(|(c, _)| *c == category) {
                Some((_, value)) => {
                    let payload = Payload::decode(category, value).unwrap();
                    builder.fresh(payload, value.clone()).unwrap();
                }
                None => {
                    builder.degraded(category, "not fetched").unwrap();
                }
            }
        }
        builder.build().unwrap()
    }

    fn stats_time(buckets: &[(u64, u64)]) -> Value {
        let stats: Vec<Value> = buckets
            .iter()
            .enumerate()
            .map(|(i, (queries, blocked))| {
                json!({
                    "time_millis": i,
                    "value": { "queries": queries, "blocked": blocked, "companies": 0 }
                })
            })
            .collect();
        json!({ "stats": stats })
    }

    // ── Totals and percentages ───────────────────────────────────────

    #[test]
    fn totals_sum_time_buckets() {
        let raw = raw_with(&[(Category::StatsTime, stats_time(&[(100, 10), (300, 40)]))]);
        let m = DerivedMetrics::compute(&raw);
        assert_eq!(m.total_queries, 400);
        assert_eq!(m.blocked_queries, 50);
        assert!((m.blocked_percentage - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn blocked_percentage_is_zero_without_queries() {
        let raw = raw_with(&[(Category::StatsTime, stats_time(&[(0, 0)]))]);
        let m = DerivedMetrics::compute(&raw);
        assert_eq!(m.total_queries, 0);
        assert!(m.blocked_percentage.abs() < f64::EPSILON);

        let degraded = DerivedMetrics::compute(&raw_with(&[]));
        assert!(degraded.blocked_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_stays_in_range() {
        let samples = [0, 1, 2, 3, 7, 99, 100, 101, 1_000, u64::MAX];
        for part in samples {
            for whole in samples {
                let p = percentage(part, whole);
                assert!((0.0..=100.0).contains(&p), "{part}/{whole} -> {p}");
                if whole == 0 {
                    assert!(p.abs() < f64::EPSILON);
                }
            }
        }
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert!((percentage(1, 3) - 33.33).abs() < f64::EPSILON);
        assert!((percentage(2, 3) - 66.67).abs() < f64::EPSILON);
    }

    // ── Domain rankings ──────────────────────────────────────────────

    #[test]
    fn duplicate_domains_are_summed_across_lists() {
        let devices = json!({ "devices": [
            { "id": "a", "statistics": { "top_blocked_domains": [
                { "domain": "ads.example", "count": 5 },
                { "domain": "track.example", "count": 9 },
                { "domain": "ads.example", "count": 3 }
            ]}},
            { "id": "b", "statistics": { "top_blocked_domains": [
                { "domain": "ads.example", "count": 2 }
            ]}}
        ]});
        let m = DerivedMetrics::compute(&raw_with(&[(Category::Devices, devices)]));

        assert_eq!(
            m.top_blocked,
            vec![
                DomainRank { domain: "ads.example".into(), count: 10 },
                DomainRank { domain: "track.example".into(), count: 9 },
            ]
        );
        assert_eq!(m.top_blocked_domain.map(|r| r.domain), Some("ads.example".into()));
    }

    #[test]
    fn ties_keep_first_seen_order_and_list_is_truncated() {
        let entries: Vec<Value> = (0..15)
            .map(|i| json!({ "domain": format!("d{i}.example"), "count": 4 }))
            .collect();
        let devices = json!([{ "statistics": { "top_queried_domains": entries } }]);
        let m = DerivedMetrics::compute(&raw_with(&[(Category::Devices, devices)]));

        assert_eq!(m.top_queried.len(), TOP_N);
        let names: Vec<&str> = m.top_queried.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(names.first(), Some(&"d0.example"));
        assert_eq!(names.last(), Some(&"d9.example"));
    }

    #[test]
    fn unnamed_domains_are_not_ranked() {
        let devices = json!([{ "statistics": { "top_blocked_domains": [
            { "domain": "", "count": 50 },
            { "domain": null, "count": 40 },
            { "count": 30 },
            { "domain": "ads.example", "count": 1 }
        ]}}]);
        let m = DerivedMetrics::compute(&raw_with(&[(Category::Devices, devices)]));

        assert_eq!(
            m.top_blocked,
            vec![DomainRank { domain: "ads.example".into(), count: 1 }]
        );
    }

    #[test]
    fn no_devices_means_no_leader() {
        let m = DerivedMetrics::compute(&raw_with(&[]));
        assert!(m.top_blocked.is_empty());
        assert_eq!(m.top_blocked_domain, None);
        assert_eq!(m.top_queried_domain, None);
    }

    // ── Protection ───────────────────────────────────────────────────

    #[test]
    fn protection_follows_query_log() {
        let with_blocks = json!({ "query_log": [
            { "domain": "ads.example", "status": "blocked" },
            { "domain": "example.org", "status": "processed" }
        ]});
        let m = DerivedMetrics::compute(&raw_with(&[(Category::QueryLog, with_blocks)]));
        assert!(m.protection_enabled);
        assert_eq!(m.protection_signal, ProtectionSignal::QueryLog);
        assert_eq!(m.recent_queries, 2);
        assert_eq!(m.recent_blocked, 1);
        assert!((m.recent_block_rate - 50.0).abs() < f64::EPSILON);

        let without_blocks = json!({ "query_log": [{ "status": "processed" }] });
        let m = DerivedMetrics::compute(&raw_with(&[(Category::QueryLog, without_blocks)]));
        assert!(!m.protection_enabled);
        assert_eq!(m.protection_signal, ProtectionSignal::QueryLog);
    }

    #[test]
    fn protection_defaults_on_without_signal() {
        let empty_log = DerivedMetrics::compute(&raw_with(&[(
            Category::QueryLog,
            json!({ "query_log": [] }),
        )]));
        assert!(empty_log.protection_enabled);
        assert_eq!(empty_log.protection_signal, ProtectionSignal::Default);

        let failed_log = DerivedMetrics::compute(&raw_with(&[]));
        assert!(failed_log.protection_enabled);
        assert_eq!(failed_log.protection_signal, ProtectionSignal::Default);
    }

    // ── Devices, servers, limits ─────────────────────────────────────

    #[test]
    fn device_summaries_apply_defaults() {
        let devices = json!({ "devices": [
            {
                "id": "a", "name": "Laptop", "status": "inactive", "linked_ip": "10.0.0.2",
                "statistics": { "queries_count": 200, "blocked_count": 50 },
                "settings": { "protection_enabled": false }
            },
            { "id": "b" }
        ]});
        let m = DerivedMetrics::compute(&raw_with(&[(Category::Devices, devices)]));

        assert_eq!(m.active_devices, 2);
        let laptop = &m.device_summaries[0];
        assert_eq!(laptop.name, "Laptop");
        assert!(!laptop.connected);
        assert!((laptop.blocked_percentage - 25.0).abs() < f64::EPSILON);
        assert!(!laptop.protection_enabled);
        assert!(laptop.safe_browsing_enabled);
        assert!(!laptop.adult_content_enabled);

        let bare = &m.device_summaries[1];
        assert_eq!(bare.name, "Unknown");
        assert!(bare.connected);
        assert!(bare.protection_enabled);
        assert!(bare.blocked_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn account_usage_and_server_count() {
        let m = DerivedMetrics::compute(&raw_with(&[
            (Category::AccountLimits, json!({ "devices": { "used": 3, "limit": 12 } })),
            (Category::DnsServers, json!([{ "id": "s1" }, { "id": "s2" }])),
        ]));
        assert_eq!(m.dns_server_count, 2);
        let usage = m.account_usage.get("devices").unwrap();
        assert_eq!((usage.used, usage.limit), (3, 12));
        assert!((usage.percentage - 25.0).abs() < f64::EPSILON);
    }

    // ── Snapshot shape ───────────────────────────────────────────────

    #[test]
    fn derive_is_byte_identical_on_repeat() {
        let raw = raw_with(&[
            (Category::StatsTime, stats_time(&[(10, 3)])),
            (
                Category::Devices,
                json!([{ "statistics": { "top_blocked_domains": [
                    { "domain": "x.example", "count": 1 },
                    { "domain": "y.example", "count": 1 }
                ]}}]),
            ),
        ]);
        let first = serde_json::to_vec(&derive(raw.clone())).unwrap();
        let second = serde_json::to_vec(&derive(raw)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_serializes_flat() {
        let snapshot = derive(raw_with(&[(Category::StatsTime, stats_time(&[(4, 1)]))]));
        let value = serde_json::to_value(&snapshot).unwrap();

        for category in Category::ALL {
            assert!(value.get(category.to_string()).is_some(), "{category}");
        }
        assert_eq!(value["total_queries"], json!(4));
        assert_eq!(value["blocked_percentage"], json!(25.0));
        assert_eq!(value["protection_enabled"], json!(true));
        assert_eq!(value["devices"], json!({}));
        assert_eq!(value["degraded_categories"].as_array().map(Vec::len), Some(5));
        assert!(snapshot.is_partial());
    }
}
