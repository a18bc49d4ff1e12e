//! Snapshot command: one poll cycle, printed.

use std::fmt::Write as _;

use tabled::Tabled;

use agdns_core::{Coordinator, CoordinatorConfig, DeviceSummary, Snapshot};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output::{self, fmt_pct, or_dash};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Linked IP")]
    linked_ip: String,
    #[tabled(rename = "Queries")]
    queries: u64,
    #[tabled(rename = "Blocked")]
    blocked: u64,
    #[tabled(rename = "Block %")]
    blocked_pct: String,
    #[tabled(rename = "Protection")]
    protection: &'static str,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            name: d.name.clone(),
            status: if d.connected { "active" } else { "inactive" },
            linked_ip: or_dash(d.linked_ip.as_deref()),
            queries: d.queries_count,
            blocked: d.blocked_count,
            blocked_pct: fmt_pct(d.blocked_percentage),
            protection: on_off(d.protection_enabled),
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// ── Layout ──────────────────────────────────────────────────────────

fn metric_rows(snapshot: &Snapshot) -> Vec<MetricRow> {
    let m = &snapshot.metrics;
    let rank = |r: Option<&agdns_core::DomainRank>| {
        r.map_or_else(|| "-".to_owned(), |r| format!("{} ({})", r.domain, r.count))
    };

    let mut rows = vec![
        MetricRow {
            name: "Total queries",
            value: m.total_queries.to_string(),
        },
        MetricRow {
            name: "Blocked queries",
            value: m.blocked_queries.to_string(),
        },
        MetricRow {
            name: "Blocked",
            value: fmt_pct(m.blocked_percentage),
        },
        MetricRow {
            name: "Top blocked domain",
            value: rank(m.top_blocked_domain.as_ref()),
        },
        MetricRow {
            name: "Top queried domain",
            value: rank(m.top_queried_domain.as_ref()),
        },
        MetricRow {
            name: "Protection",
            value: format!("{} ({})", on_off(m.protection_enabled), m.protection_signal),
        },
        MetricRow {
            name: "Recent queries",
            value: format!(
                "{} ({} blocked, {})",
                m.recent_queries,
                m.recent_blocked,
                fmt_pct(m.recent_block_rate)
            ),
        },
        MetricRow {
            name: "Devices",
            value: m.active_devices.to_string(),
        },
        MetricRow {
            name: "DNS servers",
            value: m.dns_server_count.to_string(),
        },
    ];
    rows.extend(m.account_usage.iter().map(|(name, usage)| MetricRow {
        name: "Limit",
        value: format!(
            "{name}: {}/{} ({})",
            usage.used,
            usage.limit,
            fmt_pct(usage.percentage)
        ),
    }));
    rows
}

/// Human-readable layout of a snapshot: the metric table, optionally the
/// device table, and a note naming any defaulted categories.
pub fn snapshot_table(snapshot: &Snapshot, devices: bool) -> String {
    let mut out = format!(
        "Cycle {} at {}\n",
        snapshot.cycle(),
        snapshot.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str(&output::render_table(&metric_rows(snapshot)));

    if devices && !snapshot.metrics.device_summaries.is_empty() {
        let rows: Vec<DeviceRow> = snapshot
            .metrics
            .device_summaries
            .iter()
            .map(DeviceRow::from)
            .collect();
        out.push('\n');
        out.push_str(&output::render_table(&rows));
    }

    if snapshot.is_partial() {
        let names: Vec<String> = snapshot
            .degraded_categories
            .iter()
            .map(ToString::to_string)
            .collect();
        let _ = write!(out, "\nDegraded: {}", names.join(", "));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: CoordinatorConfig,
    args: &SnapshotArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let snapshot =
        Coordinator::oneshot(config, |coordinator| async move { coordinator.first_refresh().await })
            .await?;

    let rendered = output::render(global.output, &*snapshot, |s| {
        snapshot_table(s, args.devices)
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
