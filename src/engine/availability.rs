use chrono::NaiveDate;

use crate::model::{BlockedDateRange, Reservation};

// ── Availability Resolver ─────────────────────────────────────────

/// A civil date is occupied when any non-cancelled reservation covers it
/// (check-in and checkout days inclusive) or any blocked range covers it.
/// Records with missing dates never occupy anything.
pub fn is_occupied<'a, R, B>(date: NaiveDate, reservations: R, blocked: B) -> bool
where
    R: IntoIterator<Item = &'a Reservation>,
    B: IntoIterator<Item = &'a BlockedDateRange>,
{
    reservations.into_iter().any(|r| r.occupies(date))
        || blocked.into_iter().any(|b| b.covers(date))
}
