mod availability;
mod error;
mod gate;
mod mutations;
mod queries;

pub use availability::is_occupied;
pub use error::EngineError;
pub use gate::{
    LOCKED_PLACEHOLDER, WIFI_PENDING_MESSAGE, is_released, project_for_guest, release_date,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono_tz::Tz;
use dashmap::DashMap;
use tokio::sync::{RwLock, watch};

use crate::calendar::now_utc;
use crate::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::model::*;
use crate::store::ReservationStore;

/// Engine-wide settings. `business_zone` fixes which wall clock decides
/// "today" for the active partition, credential release, and listing expiry.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub business_zone: Tz,
    pub page_size: usize,
    /// Port for the Prometheus exporter, handed to
    /// [`crate::observability::init`] by the embedder. `None` disables it.
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            business_zone: chrono_tz::America::Sao_Paulo,
            page_size: DEFAULT_PAGE_SIZE,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    /// Read `CASEIRO_BUSINESS_ZONE`, `CASEIRO_PAGE_SIZE`, and
    /// `CASEIRO_METRICS_PORT`, falling back to the defaults on unset or
    /// unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let business_zone = std::env::var("CASEIRO_BUSINESS_ZONE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.business_zone);
        let page_size = std::env::var("CASEIRO_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.page_size)
            .clamp(1, MAX_PAGE_SIZE);
        let metrics_port = std::env::var("CASEIRO_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok());
        Self {
            business_zone,
            page_size,
            metrics_port,
        }
    }
}

/// One scope's cached history pages plus the generation they were fetched
/// under.
struct CachedHistory {
    rows: Vec<Reservation>,
    next_cursor: Option<String>,
    is_last_page: bool,
    generation: u64,
}

/// Lifecycle controller. Owns local copies of the store's live feeds,
/// the per-scope history cache, and every exposed operation.
pub struct Engine {
    store: Arc<dyn ReservationStore>,
    config: EngineConfig,
    /// Local copy of the active feed. Mutations may edit it optimistically;
    /// the next feed snapshot is authoritative either way.
    active: Arc<RwLock<Vec<Reservation>>>,
    blocked: Arc<RwLock<Vec<BlockedDateRange>>>,
    history: DashMap<String, CachedHistory>,
    /// Bumped on every mutation that can change history content. Cached
    /// pages stamped with an older value are stale.
    history_generation: AtomicU64,
}

impl Engine {
    /// Build a controller over `store` and start its feed pumps.
    /// Must be called from within a Tokio runtime.
    pub fn new(store: Arc<dyn ReservationStore>, config: EngineConfig) -> Self {
        let mut active_rx = store.subscribe_active();
        let mut blocked_rx = store.subscribe_blocked_ranges();
        // Seed from the snapshots already in the mailboxes so a fresh
        // engine starts at current state, not empty.
        let active = Arc::new(RwLock::new(active_rx.borrow_and_update().as_ref().clone()));
        let blocked = Arc::new(RwLock::new(blocked_rx.borrow_and_update().as_ref().clone()));

        tokio::spawn(run_feed_pump(active_rx, Arc::clone(&active), "active"));
        tokio::spawn(run_feed_pump(blocked_rx, Arc::clone(&blocked), "blocked_ranges"));

        Self {
            store,
            config,
            active,
            blocked,
            history: DashMap::new(),
            history_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn current_generation(&self) -> u64 {
        self.history_generation.load(Ordering::Acquire)
    }

    /// Drop all cached history pages and bump the generation stamp. The
    /// stamp also invalidates fetches still in flight, which would
    /// otherwise re-insert rows computed against pre-mutation state.
    pub(super) fn invalidate_history(&self) {
        self.history.clear();
        self.history_generation.fetch_add(1, Ordering::Release);
        metrics::counter!(crate::observability::HISTORY_INVALIDATIONS_TOTAL).increment(1);
    }

    /// Record a host action. Failures are logged and counted, never
    /// propagated to the mutation that triggered them.
    pub(super) async fn audit(&self, actor: &str, action: AuditAction, target_id: &str, label: &str) {
        let entry = AuditEntry {
            actor: actor.to_string(),
            action,
            target_id: target_id.to_string(),
            label: label.to_string(),
            at: now_utc(),
        };
        if let Err(e) = self.store.record_audit(entry).await {
            metrics::counter!(crate::observability::AUDIT_FAILURES_TOTAL).increment(1);
            tracing::warn!("audit write failed for {} {target_id}: {e}", action.as_str());
        }
    }
}

/// Drain a store feed into the engine's local copy. Snapshots are whole
/// sets: each one replaces the previous, so a pump that falls behind skips
/// straight to the newest state instead of replaying intermediates.
async fn run_feed_pump<T>(
    mut rx: watch::Receiver<Arc<Vec<T>>>,
    local: Arc<RwLock<Vec<T>>>,
    feed: &'static str,
) where
    T: Clone + Send + Sync + 'static,
{
    while rx.changed().await.is_ok() {
        let snapshot = {
            let guard = rx.borrow_and_update();
            guard.as_ref().clone()
        };
        *local.write().await = snapshot;
        metrics::counter!(crate::observability::FEED_UPDATES_TOTAL, "feed" => feed).increment(1);
    }
    tracing::debug!("{feed} feed closed, pump exiting");
}
