// ── Fan-out aggregation ──
//
// One poll cycle: fetch every category concurrently, then fold the
// positional results into a `RawSnapshot`. A failed category degrades
// to its default. A malformed one keeps its body and defaults only the
// typed payload. A token-refresh failure fails the whole cycle.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use agdns_api::ApiClient;

use crate::error::CoreError;
use crate::model::{Category, Payload, RawSnapshot};

/// Per-cycle request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePlan {
    pub query_log_limit: u32,
    pub stats_window: Duration,
}

impl CyclePlan {
    /// Query parameters for `category` in a cycle starting at `now`.
    pub fn params(&self, category: Category, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if category.is_windowed() {
            let from = TimeDelta::from_std(self.stats_window)
                .ok()
                .and_then(|window| now.checked_sub_signed(window))
                .unwrap_or(DateTime::UNIX_EPOCH);
            params.push(("time_from_millis", from.timestamp_millis().to_string()));
            params.push(("time_to_millis", now.timestamp_millis().to_string()));
        }
        if category == Category::QueryLog {
            params.push(("limit", self.query_log_limit.to_string()));
        }
        params
    }
}

/// Run one fan-out and assemble the merged raw snapshot.
pub async fn collect(
    client: &ApiClient,
    plan: &CyclePlan,
    cycle: u64,
) -> Result<RawSnapshot, CoreError> {
    let now = Utc::now();
    let fetches = Category::ALL.map(|category| {
        let params = plan.params(category, now);
        async move { client.fetch(category.endpoint(), &params).await }
    });
    let results = join_all(fetches).await;

    let mut builder = RawSnapshot::builder(cycle, now);
    for (category, result) in Category::ALL.into_iter().zip(results) {
        match result {
            Ok(raw) => match Payload::decode(category, &raw) {
                Ok(payload) => {
                    debug!(%category, "category fetched");
                    builder.fresh(payload, raw)?;
                }
                Err(e) => {
                    warn!(%category, error = %e, "unexpected payload shape, using default");
                    builder.undecodable(category, raw, format!("unexpected payload shape: {e}"))?;
                }
            },
            Err(e) if e.is_auth_refresh() => {
                warn!(%category, error = %e, "token refresh failed, abandoning cycle");
                return Err(e.into());
            }
            Err(e) => {
                warn!(
                    %category,
                    error = %e,
                    transient = e.is_transient(),
                    "fetch failed, using default"
                );
                builder.degraded(category, e.to_string())?;
            }
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> CyclePlan {
        CyclePlan {
            query_log_limit: 1000,
            stats_window: Duration::from_secs(24 * 60 * 60),
        }
    }

    #[test]
    fn query_log_gets_window_and_limit() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let params = plan().params(Category::QueryLog, now);
        assert_eq!(
            params,
            vec![
                ("time_from_millis", "1699913600000".to_string()),
                ("time_to_millis", "1700000000000".to_string()),
                ("limit", "1000".to_string()),
            ]
        );
    }

    #[test]
    fn unwindowed_categories_get_no_params() {
        let now = Utc::now();
        for category in [Category::AccountLimits, Category::Devices, Category::DnsServers] {
            assert!(plan().params(category, now).is_empty(), "{category}");
        }
    }

    #[test]
    fn oversized_window_starts_at_epoch() {
        let now = DateTime::from_timestamp_millis(5_000).unwrap();
        let plan = CyclePlan {
            stats_window: Duration::from_secs(u64::MAX),
            ..plan()
        };
        let params = plan.params(Category::StatsTime, now);
        assert_eq!(params[0], ("time_from_millis", "0".to_string()));
    }
}
