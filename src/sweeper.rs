use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::calendar::today_in_zone;
use crate::engine::EngineError;
use crate::limits::MAX_SWEEP_BATCH;
use crate::model::PlaceKind;
use crate::observability;
use crate::store::ReservationStore;

/// Delete event listings whose end date (or start date when no end is set)
/// is strictly before today in the business zone. One batched delete per
/// run; when nothing has expired, no write is issued at all. Listings with
/// no usable date are skipped and logged, never deleted.
pub async fn sweep_expired_events(
    store: &dyn ReservationStore,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<usize, EngineError> {
    let today = today_in_zone(zone, now);
    let listings = store.fetch_event_listings().await?;

    let mut expired = Vec::new();
    for place in &listings {
        if place.kind != PlaceKind::Event {
            continue;
        }
        match place.expiry() {
            Some(date) if date < today => expired.push(place.id),
            Some(_) => {}
            None => warn!("event listing {} has no usable date, skipping", place.id),
        }
    }

    if expired.is_empty() {
        return Ok(0);
    }
    if expired.len() > MAX_SWEEP_BATCH {
        // Leftovers go out with the next run.
        expired.truncate(MAX_SWEEP_BATCH);
    }

    store.batch_delete_places(&expired).await?;
    metrics::counter!(observability::SWEEPER_DELETES_TOTAL).increment(expired.len() as u64);
    info!("swept {} expired event listings", expired.len());
    Ok(expired.len())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ulid::Ulid;

    use super::*;
    use crate::calendar::parse_civil_date;
    use crate::model::Place;
    use crate::store::MemoryStore;

    const ZONE: Tz = chrono_tz::America::Sao_Paulo;

    fn d(s: &str) -> NaiveDate {
        parse_civil_date(s).unwrap()
    }

    fn place(name: &str, kind: PlaceKind, date: Option<&str>, end: Option<&str>) -> Place {
        Place {
            id: Ulid::new(),
            name: name.to_string(),
            kind,
            event_date: date.map(|s| d(s)),
            event_end_date: end.map(|s| d(s)),
        }
    }

    #[tokio::test]
    async fn removes_only_past_events() {
        let store = MemoryStore::new(ZONE);
        let expired = place("feira antiga", PlaceKind::Event, Some("2024-01-15"), None);
        let upcoming = place("festival", PlaceKind::Event, Some("2024-02-15"), None);
        let expired_id = expired.id;
        store.insert_place(expired);
        store.insert_place(upcoming.clone());

        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        let removed = sweep_expired_events(&store, ZONE, now).await.unwrap();

        assert_eq!(removed, 1);
        let left = store.fetch_event_listings().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, upcoming.id);
        assert!(!left.iter().any(|p| p.id == expired_id));
    }

    #[tokio::test]
    async fn end_date_wins_over_start_date() {
        let store = MemoryStore::new(ZONE);
        // Started in January but runs until 2024-02-05: still current on
        // the 1st.
        store.insert_place(place(
            "temporada",
            PlaceKind::Event,
            Some("2024-01-20"),
            Some("2024-02-05"),
        ));

        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);

        // A week later it has passed.
        let now: DateTime<Utc> = "2024-02-08T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn today_is_not_expired() {
        let store = MemoryStore::new(ZONE);
        // 2024-02-01T12:00:00Z is 09:00 on the 1st in São Paulo.
        store.insert_place(place("hoje", PlaceKind::Event, Some("2024-02-01"), None));

        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);
        assert_eq!(store.place_count(), 1);
    }

    #[tokio::test]
    async fn dateless_events_are_skipped_not_deleted() {
        let store = MemoryStore::new(ZONE);
        store.insert_place(place("sem data", PlaceKind::Event, None, None));

        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);
        assert_eq!(store.place_count(), 1);
    }

    #[tokio::test]
    async fn evergreen_listings_are_untouched() {
        let store = MemoryStore::new(ZONE);
        store.insert_place(place(
            "restaurante",
            PlaceKind::Restaurant,
            Some("2020-01-01"),
            None,
        ));
        store.insert_place(place(
            "mirante",
            PlaceKind::Attraction,
            None,
            None,
        ));

        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);
        assert_eq!(store.place_count(), 2);
    }

    #[tokio::test]
    async fn empty_sweep_issues_no_writes() {
        let store = MemoryStore::new(ZONE);
        store.insert_place(place("festival", PlaceKind::Event, Some("2024-02-15"), None));

        let before = store.write_count();
        let now: DateTime<Utc> = "2024-02-01T12:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);
        assert_eq!(store.write_count(), before);
    }

    #[tokio::test]
    async fn expiry_uses_the_business_zone_day() {
        let store = MemoryStore::new(ZONE);
        store.insert_place(place("ontem", PlaceKind::Event, Some("2024-01-31"), None));

        // 02:00 UTC on the 1st is still 23:00 on Jan 31 in São Paulo, so
        // the listing has not expired yet.
        let now: DateTime<Utc> = "2024-02-01T02:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 0);

        // After local midnight it goes.
        let now: DateTime<Utc> = "2024-02-01T03:00:00Z".parse().unwrap();
        assert_eq!(sweep_expired_events(&store, ZONE, now).await.unwrap(), 1);
    }
}
