//! agdns-core: polling coordinator between agdns-api and consumers.
//!
//! A [`Coordinator`] runs poll cycles against the AdGuard DNS API. Each
//! cycle fetches every [`Category`] concurrently, folds the results into
//! a [`RawSnapshot`] (failed categories fall back to empty defaults),
//! derives [`DerivedMetrics`], and publishes the resulting [`Snapshot`]
//! to subscribers.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod model;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregate::CyclePlan;
pub use config::{Credentials, CoordinatorConfig, TlsVerification};
pub use coordinator::{Coordinator, CycleState};
pub use error::CoreError;
pub use metrics::{DerivedMetrics, DeviceSummary, DomainRank, ProtectionSignal, UsageSummary};
pub use model::{Category, CategoryData, Payload, RawSnapshot, Snapshot};
pub use stream::{SnapshotStream, SnapshotWatchStream};

pub use agdns_api::{DEFAULT_API_URL, DEFAULT_TOKEN_URL};
