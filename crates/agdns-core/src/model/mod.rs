// ── Domain model ──
//
// Categories, their typed payloads, and the snapshot types assembled
// from them.

pub mod category;
pub mod payload;
pub mod snapshot;

pub use category::Category;
pub use payload::{
    AccountLimits, Device, DeviceList, DeviceSettings, DeviceStatistics, DnsServer,
    DnsServerList, DomainBucket, DomainCount, DomainStats, Limit, Payload, QueryCounters,
    QueryLog, QueryLogEntry, TimeBucket, TimeStats,
};
pub use snapshot::{CategoryData, RawSnapshot, RawSnapshotBuilder, Snapshot};
