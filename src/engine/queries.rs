use crate::calendar::{now_utc, parse_civil_date};
use crate::model::*;
use crate::observability;

use super::availability::is_occupied;
use super::{CachedHistory, Engine, EngineError, gate};

impl Engine {
    /// Current active set, filtered to the caller's tenant scope. The
    /// filter runs here, against the local snapshot, not in the store
    /// query.
    pub async fn active_reservations(&self, scope: &TenantScope) -> Vec<Reservation> {
        let active = self.active.read().await;
        active
            .iter()
            .filter(|r| scope.allows(&r.property_id))
            .cloned()
            .collect()
    }

    /// True when `date` has no active reservation and no blocked range on
    /// the given property. The date arrives as a booking-form string.
    pub async fn is_date_available(
        &self,
        property_id: &str,
        date: &str,
    ) -> Result<bool, EngineError> {
        let date = parse_civil_date(date)?;
        let active = self.active.read().await;
        let blocked = self.blocked.read().await;
        let occupied = is_occupied(
            date,
            active.iter().filter(|r| r.property_id == property_id),
            blocked.iter().filter(|b| b.property_id == property_id),
        );
        Ok(!occupied)
    }

    /// Resolve a reservation by id or short code and project it through the
    /// credential gate. Unknown keys resolve to `Ok(None)`, not an error.
    pub async fn guest_safe_view(&self, key: &str) -> Result<Option<GuestSafeView>, EngineError> {
        let Some(reservation) = self.store.find_reservation(key).await? else {
            return Ok(None);
        };
        let config = self.store.get_global_config().await?;
        let view = gate::project_for_guest(
            &reservation,
            &config,
            self.config.business_zone,
            now_utc(),
        );
        let released = if view.is_released { "true" } else { "false" };
        metrics::counter!(observability::GATE_PROJECTIONS_TOTAL, "released" => released)
            .increment(1);
        Ok(Some(view))
    }

    /// Upcoming blocked spans straight from the store (host calendar view).
    pub async fn future_blocked_ranges(&self) -> Result<Vec<BlockedDateRange>, EngineError> {
        Ok(self.store.fetch_future_blocked_ranges().await?)
    }

    /// First page of finished stays for a scope. Serves the cache while it
    /// is generation-current; otherwise refetches page one.
    pub async fn history(&self, scope: &TenantScope) -> Result<HistoryView, EngineError> {
        let key = scope.cache_key();
        if let Some(cache) = self.history.get(&key)
            && cache.generation == self.current_generation() {
                return Ok(HistoryView {
                    rows: cache.rows.clone(),
                    is_last_page: cache.is_last_page,
                });
            }
        self.fetch_into_cache(scope, None, Vec::new()).await
    }

    /// Extend a scope's history by one page. On a stale or missing cache
    /// this restarts from page one; on an exhausted one it returns as-is
    /// without touching the store.
    pub async fn load_more_history(&self, scope: &TenantScope) -> Result<HistoryView, EngineError> {
        let key = scope.cache_key();
        let (cursor, prior_rows) = match self.history.get(&key) {
            Some(cache) if cache.generation == self.current_generation() => {
                if cache.is_last_page {
                    return Ok(HistoryView {
                        rows: cache.rows.clone(),
                        is_last_page: true,
                    });
                }
                match cache.next_cursor.clone() {
                    Some(cursor) => (Some(cursor), cache.rows.clone()),
                    None => (None, Vec::new()),
                }
            }
            _ => (None, Vec::new()),
        };
        self.fetch_into_cache(scope, cursor, prior_rows).await
    }

    /// Fetch one page and install it keyed by scope. Pages are stamped with
    /// the generation read before the fetch: if a mutation lands mid-flight
    /// the entry is stale on arrival and the next read refetches instead of
    /// trusting rows computed against old state.
    async fn fetch_into_cache(
        &self,
        scope: &TenantScope,
        cursor: Option<String>,
        mut rows: Vec<Reservation>,
    ) -> Result<HistoryView, EngineError> {
        let generation = self.current_generation();
        let page = self
            .store
            .fetch_history_page(cursor, self.config.page_size, scope)
            .await?;
        metrics::counter!(observability::HISTORY_FETCHES_TOTAL).increment(1);
        rows.extend(page.rows);
        let view = HistoryView {
            rows: rows.clone(),
            is_last_page: page.is_last_page,
        };
        self.history.insert(
            scope.cache_key(),
            CachedHistory {
                rows,
                next_cursor: page.next_cursor,
                is_last_page: page.is_last_page,
                generation,
            },
        );
        Ok(view)
    }
}
