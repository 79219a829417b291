use std::sync::Arc;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::calendar::parse_civil_date;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

/// Short codes draw from uppercase A-Z plus digits.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Mint a guest-shareable code. Uniqueness is probabilistic, not enforced;
/// collisions merely make a code ambiguous for lookup.
pub(super) fn mint_short_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

impl Engine {
    /// Create a booking from host/CMS input. Dates arrive as form strings
    /// and are parsed strictly before anything is written; a short code is
    /// minted on the way in.
    pub async fn create_reservation(
        &self,
        input: NewReservation,
        actor: &str,
    ) -> Result<Ulid, EngineError> {
        let check_in = parse_civil_date(&input.check_in_date)?;
        let checkout = parse_civil_date(&input.checkout_date)?;
        if check_in > checkout {
            return Err(EngineError::InvalidRange("check-in after checkout"));
        }
        if input.guest_name.len() > MAX_NAME_LEN || input.property_id.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if input
            .welcome_message
            .as_ref()
            .is_some_and(|m| m.len() > MAX_TEXT_LEN)
        {
            return Err(EngineError::LimitExceeded("welcome message too long"));
        }

        let record = NewReservationRecord {
            short_code: mint_short_code(),
            property_id: input.property_id,
            check_in_date: check_in,
            checkout_date: checkout,
            check_in_time: input.check_in_time,
            check_out_time: input.check_out_time,
            status: ReservationStatus::Active,
            guest_name: input.guest_name,
            guest_phone: input.guest_phone,
            lock_code: input.lock_code,
            welcome_message: input.welcome_message,
        };
        let label = record.guest_name.clone();
        let id = self.store.create(record).await?;
        self.invalidate_history();
        self.audit(actor, AuditAction::CreateReservation, &id.to_string(), &label)
            .await;
        metrics::counter!(observability::MUTATIONS_TOTAL, "action" => "create_reservation")
            .increment(1);
        Ok(id)
    }

    /// Patch an existing booking. The merged record must keep check-in on
    /// or before checkout; `None` fields keep their stored values.
    pub async fn edit_reservation(
        &self,
        id: Ulid,
        patch: ReservationPatch,
        actor: &str,
    ) -> Result<(), EngineError> {
        if patch.guest_name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN) {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if patch
            .welcome_message
            .as_ref()
            .is_some_and(|m| m.len() > MAX_TEXT_LEN)
        {
            return Err(EngineError::LimitExceeded("welcome message too long"));
        }
        let existing = self
            .store
            .find_reservation(&id.to_string())
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let check_in = patch.check_in_date.or(existing.check_in_date);
        let checkout = patch.checkout_date.or(existing.checkout_date);
        if let (Some(ci), Some(co)) = (check_in, checkout)
            && ci > co {
                return Err(EngineError::InvalidRange("check-in after checkout"));
            }

        let label = patch.guest_name.clone().unwrap_or(existing.guest_name);
        self.store.update(id, patch).await?;
        self.invalidate_history();
        self.audit(actor, AuditAction::EditReservation, &id.to_string(), &label)
            .await;
        metrics::counter!(observability::MUTATIONS_TOTAL, "action" => "edit_reservation")
            .increment(1);
        Ok(())
    }

    /// Delete a booking. The local active set drops the row before the
    /// store call so callers observe the removal immediately; the next feed
    /// snapshot is authoritative either way.
    pub async fn remove_reservation(&self, id: Ulid, actor: &str) -> Result<(), EngineError> {
        {
            let mut active = self.active.write().await;
            active.retain(|r| r.id != id);
        }
        self.store.delete(id).await?;
        self.invalidate_history();
        self.audit(actor, AuditAction::RemoveReservation, &id.to_string(), "")
            .await;
        metrics::counter!(observability::MUTATIONS_TOTAL, "action" => "remove_reservation")
            .increment(1);
        Ok(())
    }

    /// Flip a place in a reservation's favorites. The local set updates
    /// synchronously and the returned bool reflects it; persistence runs in
    /// the background, and the next feed snapshot settles any disagreement.
    pub async fn toggle_favorite(
        &self,
        reservation_id: Ulid,
        place_id: Ulid,
    ) -> Result<bool, EngineError> {
        let favorites = {
            let mut active = self.active.write().await;
            let reservation = active
                .iter_mut()
                .find(|r| r.id == reservation_id)
                .ok_or_else(|| EngineError::NotFound(reservation_id.to_string()))?;
            if !reservation.favorite_places.insert(place_id) {
                reservation.favorite_places.remove(&place_id);
            }
            reservation.favorite_places.clone()
        };
        let now_favorite = favorites.contains(&place_id);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let patch = ReservationPatch {
                favorite_places: Some(favorites),
                ..Default::default()
            };
            if let Err(e) = store.update(reservation_id, patch).await {
                metrics::counter!(observability::FAVORITE_SYNC_FAILURES_TOTAL).increment(1);
                tracing::warn!("favorite sync failed for {reservation_id}: {e}");
            }
        });
        Ok(now_favorite)
    }

    /// Block a span of dates on a property (maintenance, owner stay).
    pub async fn add_blocked_range(
        &self,
        property_id: &str,
        start: &str,
        end: &str,
        reason: &str,
        actor: &str,
    ) -> Result<Ulid, EngineError> {
        let start_date = parse_civil_date(start)?;
        let end_date = parse_civil_date(end)?;
        if start_date > end_date {
            return Err(EngineError::InvalidRange("range start after end"));
        }
        if reason.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let id = self
            .store
            .create_blocked_range(NewBlockedRange {
                property_id: property_id.to_string(),
                start_date,
                end_date,
                reason: reason.to_string(),
            })
            .await?;
        self.audit(actor, AuditAction::AddBlockedRange, &id.to_string(), reason)
            .await;
        metrics::counter!(observability::MUTATIONS_TOTAL, "action" => "add_blocked_range")
            .increment(1);
        Ok(id)
    }

    pub async fn remove_blocked_range(&self, id: Ulid, actor: &str) -> Result<(), EngineError> {
        self.store.delete_blocked_range(id).await?;
        self.audit(actor, AuditAction::RemoveBlockedRange, &id.to_string(), "")
            .await;
        metrics::counter!(observability::MUTATIONS_TOTAL, "action" => "remove_blocked_range")
            .increment(1);
        Ok(())
    }

    /// Remove event listings whose dates have passed. See [`crate::sweeper`].
    pub async fn sweep_expired_events(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        crate::sweeper::sweep_expired_events(self.store.as_ref(), self.config.business_zone, now)
            .await
    }
}
