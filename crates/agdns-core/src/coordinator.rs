// ── Poll coordinator ──
//
// Owns the API client, runs poll cycles on a timer or on demand, and
// publishes each merged snapshot to observers. Cycles never overlap:
// every cycle runs under one mutex, and on-demand requests made while a
// cycle is in flight collapse into a single follow-up cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use agdns_api::{ApiClient, Endpoint, OAuthConfig, TlsMode, TokenState, TransportConfig};

use crate::aggregate::{self, CyclePlan};
use crate::config::{CoordinatorConfig, TlsVerification};
use crate::error::CoreError;
use crate::metrics;
use crate::model::Snapshot;
use crate::stream::SnapshotStream;

// ── CycleState ───────────────────────────────────────────────────────

/// Scheduler state observable by consumers.
///
/// `Published` and `Failed` are resting states; the next tick or
/// on-demand request starts a new cycle from either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Fetching {
        cycle: u64,
    },
    Published {
        cycle: u64,
        at: DateTime<Utc>,
    },
    Failed {
        cycle: u64,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl CycleState {
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching { .. })
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Call
/// [`start()`](Self::start) to begin scheduled polling and
/// [`shutdown()`](Self::shutdown) to stop it.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: ApiClient,
    plan: CyclePlan,
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    state: watch::Sender<CycleState>,
    /// Held for the whole of a cycle.
    cycle_lock: Mutex<()>,
    cycles: AtomicU64,
    /// Pending on-demand refresh. `Notify` keeps at most one permit, so
    /// repeated requests coalesce.
    refresh_requested: Notify,
    cancel: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Validate `config` and build the API client. Does not fetch
    /// anything.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let transport = build_transport(&config);
        let oauth = OAuthConfig {
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            scopes: config.scopes.clone(),
        };
        let creds = &config.credentials;
        let mut initial =
            TokenState::new(creds.access_token.clone(), creds.refresh_token.clone());
        if let Some(at) = creds.expires_at {
            initial = initial.with_expiry(at);
        }
        let client = ApiClient::new(config.api_url.clone(), oauth, initial, &transport)?;

        let plan = CyclePlan {
            query_log_limit: config.query_log_limit,
            stats_window: config.stats_window,
        };
        let (snapshot, _) = watch::channel(None);
        let (state, _) = watch::channel(CycleState::Idle);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                plan,
                snapshot,
                state,
                cycle_lock: Mutex::new(()),
                cycles: AtomicU64::new(0),
                refresh_requested: Notify::new(),
                cancel: CancellationToken::new(),
                task_handle: Mutex::new(None),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Run the bootstrap cycle. Unlike scheduled cycles, a failure here
    /// is returned to the caller so the host can refuse to start.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, CoreError> {
        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                error!(error = %e, "initial refresh failed");
                Err(e)
            }
        }
    }

    /// Spawn the background polling task. Idempotent while running.
    ///
    /// If no snapshot has been published yet, the first cycle starts
    /// immediately; otherwise after one update interval.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }
        let mut handle = self.inner.task_handle.lock().await;
        if handle.is_some() {
            return Ok(());
        }

        let coordinator = self.clone();
        let period = self.inner.config.update_interval;
        let cancel = self.inner.cancel.clone();
        *handle = Some(tokio::spawn(refresh_task(coordinator, period, cancel)));
        info!(interval_secs = period.as_secs(), "polling started");
        Ok(())
    }

    /// Stop background polling and wait for the task to exit. A cycle in
    /// flight is abandoned.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task_handle.lock().await.take() {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    /// One-shot: build, run closure, shut down.
    ///
    /// No background task is started; the closure drives whatever cycles
    /// or commands it needs.
    pub async fn oneshot<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let coordinator = Coordinator::new(config)?;
        let result = f(coordinator.clone()).await;
        coordinator.shutdown().await;
        result
    }

    // ── Cycles ───────────────────────────────────────────────────────

    /// Run one cycle now, waiting for any cycle already in flight to
    /// finish first.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }
        self.run_cycle().await
    }

    /// Ask the background task for a cycle as soon as possible.
    ///
    /// Requests made while a cycle is running are merged into one
    /// follow-up cycle. Has no effect until [`start()`](Self::start).
    pub fn request_immediate_refresh(&self) {
        debug!("immediate refresh requested");
        self.inner.refresh_requested.notify_one();
    }

    async fn run_cycle(&self) -> Result<Arc<Snapshot>, CoreError> {
        let _guard = self.inner.cycle_lock.lock().await;
        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.state.send_replace(CycleState::Fetching { cycle });

        match aggregate::collect(&self.inner.client, &self.inner.plan, cycle).await {
            Ok(raw) => {
                let snapshot = Arc::new(metrics::derive(raw));
                self.inner
                    .snapshot
                    .send_replace(Some(Arc::clone(&snapshot)));
                self.inner.state.send_replace(CycleState::Published {
                    cycle,
                    at: snapshot.fetched_at(),
                });
                info!(
                    cycle,
                    degraded = snapshot.degraded_categories.len(),
                    total_queries = snapshot.metrics.total_queries,
                    "snapshot published"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(cycle, error = %e, "poll cycle failed");
                self.inner.state.send_replace(CycleState::Failed {
                    cycle,
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Delete the remote query log. On success an immediate refresh is
    /// requested. Failures are logged and reported as `false`.
    pub async fn clear_remote_log(&self) -> bool {
        match self.inner.client.delete(Endpoint::QueryLog).await {
            Ok(()) => {
                info!("query log cleared");
                self.request_immediate_refresh();
                true
            }
            Err(e) => {
                error!(error = %e, "failed to clear query log");
                false
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    /// The most recently published snapshot, if any cycle has completed.
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    pub fn state(&self) -> CycleState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to scheduler state changes.
    pub fn state_changes(&self) -> watch::Receiver<CycleState> {
        self.inner.state.subscribe()
    }

    /// Current token pair, for hosts that persist it across restarts.
    pub fn token_state(&self) -> Arc<TokenState> {
        self.inner.client.tokens().state()
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Run cycles on every tick and on every on-demand request.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if coordinator.latest_snapshot().is_some() {
        interval.tick().await; // consume the immediate first tick
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = coordinator.inner.refresh_requested.notified() => {
                interval.reset();
            }
            _ = interval.tick() => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = coordinator.run_cycle() => {}
        }
    }

    if coordinator.state().is_fetching() {
        coordinator.inner.state.send_replace(CycleState::Idle);
    }
}

fn build_transport(config: &CoordinatorConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
    };
    TransportConfig {
        tls,
        ..TransportConfig::default()
    }
    .with_timeout(config.timeout)
}
