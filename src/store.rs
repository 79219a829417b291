//! Persistence seam and the bundled in-memory adapter.
//!
//! The engine talks to storage only through [`ReservationStore`]. Live data
//! arrives as whole-snapshot feeds over `tokio::sync::watch`: every change
//! publishes the complete current set, and a slow consumer simply skips to
//! the newest snapshot. History is pulled page by page with opaque cursors.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use ulid::Ulid;

use crate::calendar::{format_civil_date, now_utc, parse_civil_date, today_in_zone};
use crate::limits::SHORT_CODE_LEN;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Transport(String),
    NotFound(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport: {msg}"),
            StoreError::NotFound(key) => write!(f, "not found: {key}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// One page of finished stays. `is_last_page` uses the full-page heuristic:
/// a page with exactly `page_size` rows reports more data even when none
/// remains, so the final fetch of an evenly divisible set comes back empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub rows: Vec<Reservation>,
    pub next_cursor: Option<String>,
    pub is_last_page: bool,
}

/// Storage contract for the reservation engine.
///
/// Adapters decide where documents live; the engine only assumes the
/// behaviors spelled out here: snapshot feeds, cursor pagination ordered by
/// most recent checkout first, and id-or-short-code lookup.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Live feed of the active set (checkout today or later, any status).
    fn subscribe_active(&self) -> watch::Receiver<Arc<Vec<Reservation>>>;

    /// Live feed of all blocked date ranges.
    fn subscribe_blocked_ranges(&self) -> watch::Receiver<Arc<Vec<BlockedDateRange>>>;

    /// Fetch one history page. `cursor: None` means the first page; the
    /// scope filter is applied by the adapter, not the caller.
    async fn fetch_history_page(
        &self,
        cursor: Option<String>,
        page_size: usize,
        scope: &TenantScope,
    ) -> Result<HistoryPage, StoreError>;

    /// Persist a new reservation and return its store-assigned id.
    async fn create(&self, record: NewReservationRecord) -> Result<Ulid, StoreError>;

    async fn update(&self, id: Ulid, patch: ReservationPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: Ulid) -> Result<(), StoreError>;

    /// Resolve a reservation by id or by short code (case-insensitive).
    /// Unknown keys are `Ok(None)`, not an error.
    async fn find_reservation(&self, key: &str) -> Result<Option<Reservation>, StoreError>;

    async fn create_blocked_range(&self, range: NewBlockedRange) -> Result<Ulid, StoreError>;

    async fn delete_blocked_range(&self, id: Ulid) -> Result<(), StoreError>;

    /// Blocked ranges that have not fully passed yet (end date today or
    /// later).
    async fn fetch_future_blocked_ranges(&self) -> Result<Vec<BlockedDateRange>, StoreError>;

    async fn get_global_config(&self) -> Result<AppConfig, StoreError>;

    /// All listings of kind event, regardless of date.
    async fn fetch_event_listings(&self) -> Result<Vec<Place>, StoreError>;

    /// Remove the given listings in one atomic batch.
    async fn batch_delete_places(&self, ids: &[Ulid]) -> Result<(), StoreError>;

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;
}

// ── Cursor encoding ─────────────────────────────────────────────────

/// Cursors are position keys (`checkout-date/id`), not row references:
/// they keep working when the boundary row disappears between fetches.
fn encode_cursor(row: &Reservation) -> String {
    match row.checkout_date {
        Some(date) => format!("{}/{}", format_civil_date(date), row.id),
        None => format!("-/{}", row.id),
    }
}

fn parse_cursor(raw: &str) -> Result<(Option<NaiveDate>, Ulid), StoreError> {
    let bad = || StoreError::Transport(format!("malformed history cursor: {raw:?}"));
    let (date_part, id_part) = raw.split_once('/').ok_or_else(bad)?;
    let date = match date_part {
        "-" => None,
        s => Some(parse_civil_date(s).map_err(|_| bad())?),
    };
    let id = Ulid::from_string(id_part).map_err(|_| bad())?;
    Ok((date, id))
}

// ── In-memory adapter ───────────────────────────────────────────────

/// DashMap-backed store. The production deployments sit behind a hosted
/// document database; this adapter backs tests and single-process setups
/// while exercising the exact same contract, including the full-page
/// pagination heuristic.
pub struct MemoryStore {
    zone: chrono_tz::Tz,
    reservations: DashMap<Ulid, Reservation>,
    blocked: DashMap<Ulid, BlockedDateRange>,
    places: DashMap<Ulid, Place>,
    config: RwLock<AppConfig>,
    audit_log: Mutex<Vec<AuditEntry>>,
    active_tx: watch::Sender<Arc<Vec<Reservation>>>,
    blocked_tx: watch::Sender<Arc<Vec<BlockedDateRange>>>,
    feed_paused: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_audit: AtomicBool,
    content_writes: AtomicU64,
    history_fetches: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(chrono_tz::America::Sao_Paulo)
    }
}

impl MemoryStore {
    pub fn new(zone: chrono_tz::Tz) -> Self {
        let (active_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (blocked_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            zone,
            reservations: DashMap::new(),
            blocked: DashMap::new(),
            places: DashMap::new(),
            config: RwLock::new(AppConfig::default()),
            audit_log: Mutex::new(Vec::new()),
            active_tx,
            blocked_tx,
            feed_paused: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_audit: AtomicBool::new(false),
            content_writes: AtomicU64::new(0),
            history_fetches: AtomicU64::new(0),
        }
    }

    fn today(&self) -> NaiveDate {
        today_in_zone(self.zone, now_utc())
    }

    fn publish_active(&self) {
        if self.feed_paused.load(Ordering::Acquire) {
            return;
        }
        let today = self.today();
        let mut rows: Vec<Reservation> = self
            .reservations
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.is_active(today))
            .collect();
        rows.sort_by(|a, b| {
            a.check_in_date
                .cmp(&b.check_in_date)
                .then(a.id.cmp(&b.id))
        });
        self.active_tx.send_replace(Arc::new(rows));
    }

    fn publish_blocked(&self) {
        if self.feed_paused.load(Ordering::Acquire) {
            return;
        }
        let mut rows: Vec<BlockedDateRange> =
            self.blocked.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        self.blocked_tx.send_replace(Arc::new(rows));
    }

    fn bump_writes(&self) {
        self.content_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StoreError::Transport("injected write failure".to_string()));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(StoreError::Transport("injected read failure".to_string()));
        }
        Ok(())
    }

    // ── Operator / test controls ─────────────────────────────

    pub async fn set_config(&self, config: AppConfig) {
        *self.config.write().await = config;
    }

    pub fn insert_place(&self, place: Place) {
        self.places.insert(place.id, place);
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    /// Direct read, bypassing the trait. Test support.
    pub fn reservation(&self, id: &Ulid) -> Option<Reservation> {
        self.reservations.get(id).map(|e| e.value().clone())
    }

    /// Suspend feed publishes. Mutations still apply; watchers see nothing
    /// until [`MemoryStore::resume_feeds`] replays the current snapshots.
    pub fn pause_feeds(&self) {
        self.feed_paused.store(true, Ordering::Release);
    }

    pub fn resume_feeds(&self) {
        self.feed_paused.store(false, Ordering::Release);
        self.publish_active();
        self.publish_blocked();
    }

    pub fn set_fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::Release);
    }

    pub fn set_fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::Release);
    }

    pub fn set_fail_audit(&self, on: bool) {
        self.fail_audit.store(on, Ordering::Release);
    }

    /// Content writes so far (creates, updates, deletes; audit excluded).
    pub fn write_count(&self) -> u64 {
        self.content_writes.load(Ordering::Relaxed)
    }

    pub fn history_fetch_count(&self) -> u64 {
        self.history_fetches.load(Ordering::Relaxed)
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit_log.lock().await.clone()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    fn subscribe_active(&self) -> watch::Receiver<Arc<Vec<Reservation>>> {
        self.active_tx.subscribe()
    }

    fn subscribe_blocked_ranges(&self) -> watch::Receiver<Arc<Vec<BlockedDateRange>>> {
        self.blocked_tx.subscribe()
    }

    async fn fetch_history_page(
        &self,
        cursor: Option<String>,
        page_size: usize,
        scope: &TenantScope,
    ) -> Result<HistoryPage, StoreError> {
        self.check_read()?;
        self.history_fetches.fetch_add(1, Ordering::Relaxed);
        let page_size = page_size.max(1);
        let today = self.today();

        let mut rows: Vec<Reservation> = self
            .reservations
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| !r.is_active(today) && scope.allows(&r.property_id))
            .collect();
        // Most recent checkout first; id breaks ties so cursors form a
        // total order.
        rows.sort_by(|a, b| {
            b.checkout_date
                .cmp(&a.checkout_date)
                .then(b.id.cmp(&a.id))
        });

        let begin = match cursor {
            None => 0,
            Some(ref raw) => {
                let key = parse_cursor(raw)?;
                rows.iter()
                    .position(|r| (r.checkout_date, r.id) < key)
                    .unwrap_or(rows.len())
            }
        };
        let page: Vec<Reservation> = rows[begin..].iter().take(page_size).cloned().collect();
        let is_last_page = page.len() < page_size;
        let next_cursor = if is_last_page {
            None
        } else {
            page.last().map(encode_cursor)
        };
        Ok(HistoryPage {
            rows: page,
            next_cursor,
            is_last_page,
        })
    }

    async fn create(&self, record: NewReservationRecord) -> Result<Ulid, StoreError> {
        self.check_write()?;
        self.bump_writes();
        let id = Ulid::new();
        let reservation = Reservation {
            id,
            short_code: record.short_code,
            property_id: record.property_id,
            check_in_date: Some(record.check_in_date),
            checkout_date: Some(record.checkout_date),
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            status: record.status,
            guest_name: record.guest_name,
            guest_phone: record.guest_phone,
            lock_code: record.lock_code,
            welcome_message: record.welcome_message,
            guest_alert: None,
            favorite_places: BTreeSet::new(),
        };
        self.reservations.insert(id, reservation);
        self.publish_active();
        Ok(id)
    }

    async fn update(&self, id: Ulid, patch: ReservationPatch) -> Result<(), StoreError> {
        self.check_write()?;
        self.bump_writes();
        {
            let mut entry = self
                .reservations
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply(entry.value_mut());
        }
        self.publish_active();
        Ok(())
    }

    async fn delete(&self, id: Ulid) -> Result<(), StoreError> {
        self.check_write()?;
        self.bump_writes();
        self.reservations
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.publish_active();
        Ok(())
    }

    async fn find_reservation(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        self.check_read()?;
        let key = key.trim();
        if let Ok(id) = Ulid::from_string(key) {
            return Ok(self.reservations.get(&id).map(|e| e.value().clone()));
        }
        if key.len() == SHORT_CODE_LEN {
            let code = key.to_ascii_uppercase();
            return Ok(self
                .reservations
                .iter()
                .find(|e| e.value().short_code == code)
                .map(|e| e.value().clone()));
        }
        Ok(None)
    }

    async fn create_blocked_range(&self, range: NewBlockedRange) -> Result<Ulid, StoreError> {
        self.check_write()?;
        self.bump_writes();
        let id = Ulid::new();
        self.blocked.insert(
            id,
            BlockedDateRange {
                id,
                property_id: range.property_id,
                start_date: range.start_date,
                end_date: range.end_date,
                reason: range.reason,
            },
        );
        self.publish_blocked();
        Ok(id)
    }

    async fn delete_blocked_range(&self, id: Ulid) -> Result<(), StoreError> {
        self.check_write()?;
        self.bump_writes();
        self.blocked
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.publish_blocked();
        Ok(())
    }

    async fn fetch_future_blocked_ranges(&self) -> Result<Vec<BlockedDateRange>, StoreError> {
        self.check_read()?;
        let today = self.today();
        let mut rows: Vec<BlockedDateRange> = self
            .blocked
            .iter()
            .map(|e| e.value().clone())
            .filter(|b| b.end_date >= today)
            .collect();
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_global_config(&self) -> Result<AppConfig, StoreError> {
        self.check_read()?;
        Ok(self.config.read().await.clone())
    }

    async fn fetch_event_listings(&self) -> Result<Vec<Place>, StoreError> {
        self.check_read()?;
        let mut rows: Vec<Place> = self
            .places
            .iter()
            .map(|e| e.value().clone())
            .filter(|p| p.kind == PlaceKind::Event)
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn batch_delete_places(&self, ids: &[Ulid]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.check_write()?;
        self.bump_writes();
        for id in ids {
            self.places.remove(id);
        }
        Ok(())
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        if self.fail_audit.load(Ordering::Acquire) {
            return Err(StoreError::Transport("injected audit failure".to_string()));
        }
        self.audit_log.lock().await.push(entry);
        Ok(())
    }
}
