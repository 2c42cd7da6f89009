//! Date-overlap rule used for conflict detection and availability.

use super::booking::{Booking, StayDates};

/// `[a1, a2)` and `[b1, b2)` overlap iff `a1 < b2 && b1 < a2`.
pub fn ranges_overlap(a: &StayDates, b: &StayDates) -> bool {
    a.check_in() < b.check_out() && b.check_in() < a.check_out()
}

/// First booking that holds `room_id` during `stay`. Bookings for other rooms
/// and non-blocking statuses are skipped, so callers may pass a superset.
pub fn find_conflict<'a, I>(room_id: i64, stay: &StayDates, bookings: I) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings.into_iter().find(|existing| {
        existing.room_id == room_id
            && existing.status.is_blocking()
            && ranges_overlap(&existing.stay, stay)
    })
}

pub fn is_blocked<'a, I>(room_id: i64, stay: &StayDates, bookings: I) -> bool
where
    I: IntoIterator<Item = &'a Booking>,
{
    find_conflict(room_id, stay, bookings).is_some()
}
