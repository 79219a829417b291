use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Stored booking status. Cancelled bookings stay on the books so hosts can
/// see them; they only stop counting toward occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Active,
    Cancelled,
}

/// A stay, as persisted. Date fields are lenient on read: a record whose
/// stored dates are missing or malformed still loads, with `None` where the
/// date should be. Such a record is never active and never releases
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    /// Guest-shareable lookup code, uppercase A-Z/0-9.
    pub short_code: String,
    pub property_id: String,
    #[serde(default, deserialize_with = "crate::calendar::lenient_civil_date")]
    pub check_in_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::calendar::lenient_civil_date")]
    pub checkout_date: Option<NaiveDate>,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub status: ReservationStatus,
    pub guest_name: String,
    #[serde(default)]
    pub guest_phone: Option<String>,
    /// Door code for this stay. Guests only see it through the release gate.
    #[serde(default)]
    pub lock_code: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    /// Host notice shown on the guest page; `None` means no alert.
    #[serde(default)]
    pub guest_alert: Option<String>,
    #[serde(default)]
    pub favorite_places: BTreeSet<Ulid>,
}

impl Reservation {
    /// Active iff the checkout day has not yet passed. The partition is
    /// always computed against "today", never stored.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.checkout_date.is_some_and(|checkout| checkout >= today)
    }

    /// Whether this stay occupies `date`. Check-in and checkout days both
    /// count (inclusive-inclusive); cancelled stays never occupy.
    pub fn occupies(&self, date: NaiveDate) -> bool {
        if self.status == ReservationStatus::Cancelled {
            return false;
        }
        match (self.check_in_date, self.checkout_date) {
            (Some(check_in), Some(checkout)) => check_in <= date && date <= checkout,
            _ => false,
        }
    }
}

/// A host-blocked span of dates on one property (maintenance, owner stay).
/// Both boundary days are blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedDateRange {
    pub id: Ulid,
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl BlockedDateRange {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// What kind of local listing a [`Place`] is. Only events carry dates and
/// expire; attractions and restaurants are evergreen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Event,
    Attraction,
    Restaurant,
}

/// A curated local listing shown to guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: Ulid,
    pub name: String,
    pub kind: PlaceKind,
    #[serde(default, deserialize_with = "crate::calendar::lenient_civil_date")]
    pub event_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::calendar::lenient_civil_date")]
    pub event_end_date: Option<NaiveDate>,
}

impl Place {
    /// The day this listing stops being current: the end date when set,
    /// otherwise the start date. `None` when neither parsed.
    pub fn expiry(&self) -> Option<NaiveDate> {
        self.event_end_date.or(self.event_date)
    }
}

/// Property-wide settings shared by every guest page: wifi, safe code,
/// house rules. A single document in the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub safe_code: String,
    #[serde(default)]
    pub house_rules: Option<String>,
    #[serde(default)]
    pub support_phone: Option<String>,
}

// ── Write payloads ─────────────────────────────────────────────────

/// Host/CMS input for a new booking. Dates arrive as form strings and are
/// parsed strictly by the engine before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub property_id: String,
    pub guest_name: String,
    #[serde(default)]
    pub guest_phone: Option<String>,
    pub check_in_date: String,
    pub checkout_date: String,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub lock_code: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

/// Validated create payload handed to the store. The store assigns the id;
/// favorites start empty and no alert is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservationRecord {
    pub short_code: String,
    pub property_id: String,
    pub check_in_date: NaiveDate,
    pub checkout_date: NaiveDate,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub status: ReservationStatus,
    pub guest_name: String,
    pub guest_phone: Option<String>,
    pub lock_code: Option<String>,
    pub welcome_message: Option<String>,
}

/// Partial update for a stored reservation. `None` fields keep their stored
/// values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationPatch {
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub checkout_date: Option<NaiveDate>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub status: Option<ReservationStatus>,
    pub lock_code: Option<String>,
    pub welcome_message: Option<String>,
    /// `Some(None)` clears an existing alert.
    pub guest_alert: Option<Option<String>>,
    pub favorite_places: Option<BTreeSet<Ulid>>,
}

impl ReservationPatch {
    pub fn apply(self, reservation: &mut Reservation) {
        if let Some(v) = self.guest_name {
            reservation.guest_name = v;
        }
        if let Some(v) = self.guest_phone {
            reservation.guest_phone = Some(v);
        }
        if let Some(v) = self.check_in_date {
            reservation.check_in_date = Some(v);
        }
        if let Some(v) = self.checkout_date {
            reservation.checkout_date = Some(v);
        }
        if let Some(v) = self.check_in_time {
            reservation.check_in_time = Some(v);
        }
        if let Some(v) = self.check_out_time {
            reservation.check_out_time = Some(v);
        }
        if let Some(v) = self.status {
            reservation.status = v;
        }
        if let Some(v) = self.lock_code {
            reservation.lock_code = Some(v);
        }
        if let Some(v) = self.welcome_message {
            reservation.welcome_message = Some(v);
        }
        if let Some(v) = self.guest_alert {
            reservation.guest_alert = v;
        }
        if let Some(v) = self.favorite_places {
            reservation.favorite_places = v;
        }
    }
}

/// Validated create payload for a blocked range; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockedRange {
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

// ── Audit trail ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateReservation,
    EditReservation,
    RemoveReservation,
    AddBlockedRange,
    RemoveBlockedRange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateReservation => "create_reservation",
            AuditAction::EditReservation => "edit_reservation",
            AuditAction::RemoveReservation => "remove_reservation",
            AuditAction::AddBlockedRange => "add_blocked_range",
            AuditAction::RemoveBlockedRange => "remove_blocked_range",
        }
    }
}

/// One host action, written after the mutation it describes succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub actor: String,
    pub action: AuditAction,
    pub target_id: String,
    /// Human-readable context (guest name, block reason).
    pub label: String,
    pub at: DateTime<Utc>,
}

// ── Tenancy ────────────────────────────────────────────────────────

/// Which properties a caller may see. `All` is the unrestricted admin view;
/// `Properties` restricts to an explicit set, and an empty set matches
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    All,
    Properties(BTreeSet<String>),
}

impl TenantScope {
    pub fn allows(&self, property_id: &str) -> bool {
        match self {
            TenantScope::All => true,
            TenantScope::Properties(ids) => ids.contains(property_id),
        }
    }

    /// Stable cache key. BTreeSet iteration is sorted, so equal scopes
    /// always produce equal keys; each id is length-prefixed so ids that
    /// contain the separator cannot make two scopes collide.
    pub fn cache_key(&self) -> String {
        match self {
            TenantScope::All => "*".to_string(),
            TenantScope::Properties(ids) => ids
                .iter()
                .map(|id| format!("{}:{id}", id.len()))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

// ── Derived views ──────────────────────────────────────────────────

/// What the guest page may see. Derived on demand by the release gate,
/// never persisted: before release day the credential fields hold
/// placeholders, not the stored values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSafeView {
    pub id: Ulid,
    pub short_code: String,
    pub property_id: String,
    pub guest_name: String,
    pub check_in_date: Option<NaiveDate>,
    pub checkout_date: Option<NaiveDate>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub welcome_message: Option<String>,
    pub guest_alert: Option<String>,
    pub favorite_places: BTreeSet<Ulid>,
    /// Network name is not a credential; always real.
    pub wifi_ssid: String,
    pub house_rules: Option<String>,
    pub support_phone: Option<String>,
    pub is_released: bool,
    pub lock_code: String,
    pub safe_code: String,
    pub wifi_pass: String,
}

/// Accumulated history rows for one tenant scope, oldest page last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub rows: Vec<Reservation>,
    pub is_last_page: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_civil_date;

    fn d(s: &str) -> NaiveDate {
        parse_civil_date(s).unwrap()
    }

    fn stay(check_in: &str, checkout: &str) -> Reservation {
        Reservation {
            id: Ulid::new(),
            short_code: "A1B2C3".to_string(),
            property_id: "casa-da-praia".to_string(),
            check_in_date: Some(d(check_in)),
            checkout_date: Some(d(checkout)),
            check_in_time: None,
            check_out_time: None,
            status: ReservationStatus::Active,
            guest_name: "Marina".to_string(),
            guest_phone: None,
            lock_code: Some("4321".to_string()),
            welcome_message: None,
            guest_alert: None,
            favorite_places: BTreeSet::new(),
        }
    }

    #[test]
    fn active_partition_is_checkout_inclusive() {
        let r = stay("2025-03-01", "2025-03-05");
        assert!(r.is_active(d("2025-03-05"))); // checkout day still active
        assert!(r.is_active(d("2025-02-01")));
        assert!(!r.is_active(d("2025-03-06")));
    }

    #[test]
    fn record_without_checkout_is_never_active() {
        let mut r = stay("2025-03-01", "2025-03-05");
        r.checkout_date = None;
        assert!(!r.is_active(d("2025-03-01")));
    }

    #[test]
    fn occupancy_includes_both_boundary_days() {
        let r = stay("2025-03-01", "2025-03-05");
        assert!(r.occupies(d("2025-03-01")));
        assert!(r.occupies(d("2025-03-03")));
        assert!(r.occupies(d("2025-03-05")));
        assert!(!r.occupies(d("2025-02-28")));
        assert!(!r.occupies(d("2025-03-06")));
    }

    #[test]
    fn cancelled_stay_never_occupies_but_stays_active() {
        let mut r = stay("2025-03-01", "2025-03-05");
        r.status = ReservationStatus::Cancelled;
        assert!(!r.occupies(d("2025-03-03")));
        // It still shows in the active list until checkout passes.
        assert!(r.is_active(d("2025-03-03")));
    }

    #[test]
    fn stay_with_missing_dates_never_occupies() {
        let mut r = stay("2025-03-01", "2025-03-05");
        r.check_in_date = None;
        assert!(!r.occupies(d("2025-03-03")));
    }

    #[test]
    fn reservation_wire_shape_is_camel_case() {
        let r = stay("2025-12-20", "2025-12-27");
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["checkInDate"], "2025-12-20");
        assert_eq!(v["checkoutDate"], "2025-12-27");
        assert_eq!(v["shortCode"], "A1B2C3");
        assert_eq!(v["status"], "active");
        assert_eq!(v["guestName"], "Marina");
    }

    #[test]
    fn malformed_stored_dates_load_as_none() {
        let raw = format!(
            r#"{{
                "id": "{}",
                "shortCode": "ZZ9XY0",
                "propertyId": "casa-da-praia",
                "checkInDate": "soon",
                "guestName": "Rui"
            }}"#,
            Ulid::new()
        );
        let r: Reservation = serde_json::from_str(&raw).unwrap();
        assert_eq!(r.check_in_date, None); // malformed
        assert_eq!(r.checkout_date, None); // missing
        assert_eq!(r.status, ReservationStatus::Active); // default
        assert!(r.favorite_places.is_empty());
        assert!(!r.is_active(d("2025-01-01")));
    }

    #[test]
    fn blocked_range_covers_inclusively() {
        let b = BlockedDateRange {
            id: Ulid::new(),
            property_id: "casa-da-praia".to_string(),
            start_date: d("2025-06-10"),
            end_date: d("2025-06-12"),
            reason: "painting".to_string(),
        };
        assert!(b.covers(d("2025-06-10")));
        assert!(b.covers(d("2025-06-12")));
        assert!(!b.covers(d("2025-06-09")));
        assert!(!b.covers(d("2025-06-13")));
    }

    #[test]
    fn place_expiry_prefers_end_date() {
        let mut p = Place {
            id: Ulid::new(),
            name: "Festival de Inverno".to_string(),
            kind: PlaceKind::Event,
            event_date: Some(d("2025-07-10")),
            event_end_date: Some(d("2025-07-14")),
        };
        assert_eq!(p.expiry(), Some(d("2025-07-14")));
        p.event_end_date = None;
        assert_eq!(p.expiry(), Some(d("2025-07-10")));
        p.event_date = None;
        assert_eq!(p.expiry(), None);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut r = stay("2025-03-01", "2025-03-05");
        r.guest_alert = Some("pool closed".to_string());
        let patch = ReservationPatch {
            guest_name: Some("Marina Souza".to_string()),
            checkout_date: Some(d("2025-03-07")),
            guest_alert: Some(None), // clear the alert
            ..Default::default()
        };
        patch.apply(&mut r);
        assert_eq!(r.guest_name, "Marina Souza");
        assert_eq!(r.checkout_date, Some(d("2025-03-07")));
        assert_eq!(r.check_in_date, Some(d("2025-03-01"))); // untouched
        assert_eq!(r.guest_alert, None);
        assert_eq!(r.status, ReservationStatus::Active);
    }

    #[test]
    fn tenant_scope_filters_properties() {
        let scope = TenantScope::Properties(BTreeSet::from([
            "casa-da-praia".to_string(),
            "chale-verde".to_string(),
        ]));
        assert!(scope.allows("casa-da-praia"));
        assert!(!scope.allows("loft-centro"));
        assert!(TenantScope::All.allows("loft-centro"));
        assert!(!TenantScope::Properties(BTreeSet::new()).allows("casa-da-praia"));
    }

    #[test]
    fn tenant_scope_cache_keys_are_stable() {
        let a = TenantScope::Properties(BTreeSet::from([
            "b".to_string(),
            "a".to_string(),
        ]));
        let b = TenantScope::Properties(BTreeSet::from([
            "a".to_string(),
            "b".to_string(),
        ]));
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "1:a,1:b");
        assert_eq!(TenantScope::All.cache_key(), "*");
        assert_ne!(
            TenantScope::Properties(BTreeSet::new()).cache_key(),
            TenantScope::All.cache_key()
        );
    }

    #[test]
    fn tenant_scope_cache_keys_survive_separator_in_ids() {
        // {"a,b"} and {"a","b"} are different scopes and must cache apart.
        let joined = TenantScope::Properties(BTreeSet::from(["a,b".to_string()]));
        let split = TenantScope::Properties(BTreeSet::from([
            "a".to_string(),
            "b".to_string(),
        ]));
        assert_ne!(joined.cache_key(), split.cache_key());
        // Same for ids that contain the length prefix's own separator.
        let colon = TenantScope::Properties(BTreeSet::from(["1:a".to_string()]));
        let plain = TenantScope::Properties(BTreeSet::from(["a".to_string()]));
        assert_ne!(colon.cache_key(), plain.cache_key());
    }

    #[test]
    fn audit_action_labels_match_wire_form() {
        let entry = AuditEntry {
            actor: "ana".to_string(),
            action: AuditAction::AddBlockedRange,
            target_id: Ulid::new().to_string(),
            label: "painting".to_string(),
            at: crate::calendar::now_utc(),
        };
        let v: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["action"], "add_blocked_range");
        assert_eq!(v["action"], AuditAction::AddBlockedRange.as_str());
    }
}
