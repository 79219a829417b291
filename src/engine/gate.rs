use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::calendar::today_in_zone;
use crate::model::{AppConfig, GuestSafeView, Reservation};

// ── Credential Release Gate ───────────────────────────────────────

/// Shown in place of the lock and safe codes until the release day.
pub const LOCKED_PLACEHOLDER: &str = "****";

/// Shown in place of the wifi password until the release day. The guest
/// page renders this directly, so it reads as a sentence, not as a masked
/// code.
pub const WIFI_PENDING_MESSAGE: &str = "Available one day before check-in";

/// The civil day credentials unlock: one day before check-in. `None` only
/// when check-in sits at the calendar's lower bound, which never releases.
pub fn release_date(check_in: NaiveDate) -> Option<NaiveDate> {
    check_in.pred_opt()
}

/// Released iff today (business zone) is on or after the release day.
/// A reservation with no parseable check-in fails closed.
pub fn is_released(reservation: &Reservation, today: NaiveDate) -> bool {
    reservation
        .check_in_date
        .and_then(release_date)
        .is_some_and(|release| today >= release)
}

/// Project a reservation into what the guest page may see. Until release
/// day the lock and safe codes are substituted with [`LOCKED_PLACEHOLDER`]
/// and the wifi password with [`WIFI_PENDING_MESSAGE`]; the stored values
/// never enter the view before then. Everything non-sensitive passes
/// through unchanged.
pub fn project_for_guest(
    reservation: &Reservation,
    config: &AppConfig,
    zone: Tz,
    now: DateTime<Utc>,
) -> GuestSafeView {
    let today = today_in_zone(zone, now);
    let released = is_released(reservation, today);
    let (lock_code, safe_code, wifi_pass) = if released {
        (
            reservation.lock_code.clone().unwrap_or_default(),
            config.safe_code.clone(),
            config.wifi_pass.clone(),
        )
    } else {
        (
            LOCKED_PLACEHOLDER.to_string(),
            LOCKED_PLACEHOLDER.to_string(),
            WIFI_PENDING_MESSAGE.to_string(),
        )
    };
    GuestSafeView {
        id: reservation.id,
        short_code: reservation.short_code.clone(),
        property_id: reservation.property_id.clone(),
        guest_name: reservation.guest_name.clone(),
        check_in_date: reservation.check_in_date,
        checkout_date: reservation.checkout_date,
        check_in_time: reservation.check_in_time.clone(),
        check_out_time: reservation.check_out_time.clone(),
        welcome_message: reservation.welcome_message.clone(),
        guest_alert: reservation.guest_alert.clone(),
        favorite_places: reservation.favorite_places.clone(),
        wifi_ssid: config.wifi_ssid.clone(),
        house_rules: config.house_rules.clone(),
        support_phone: config.support_phone.clone(),
        is_released: released,
        lock_code,
        safe_code,
        wifi_pass,
    }
}
