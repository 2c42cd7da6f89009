//! Booking entity and its lifecycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::catalog::Room;
use super::overlap;
use super::UnknownVariant;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("check-in {check_in} must be before check-out {check_out}")]
pub struct InvalidStayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// Half-open stay `[check_in, check_out)`. The check-out day is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, InvalidStayDates> {
        if check_in >= check_out {
            return Err(InvalidStayDates {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Always at least one.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayDates) -> bool {
        overlap::ranges_overlap(self, other)
    }
}

impl fmt::Display for StayDates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Only confirmed stays hold the room against new requests.
    pub fn is_blocking(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "booking status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: i64,
    pub hotel_id: i64,
    pub room_id: i64,
    #[serde(flatten)]
    pub stay: StayDates,
    pub guests: i32,
    /// Snapshot of nights x nightly price taken at creation.
    pub total_amount: BigDecimal,
    pub status: BookingStatus,
    #[serde(flatten)]
    pub guest: GuestInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_pending(
        user_id: i64,
        room: &Room,
        stay: StayDates,
        guests: i32,
        guest: GuestInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            hotel_id: room.hotel_id,
            room_id: room.id,
            stay,
            guests,
            total_amount: quote_total(room, &stay),
            status: BookingStatus::Pending,
            guest,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn nights(&self) -> i64 {
        self.stay.nights()
    }

    /// Moves the booking to `target`. `room_bookings` must hold the room's
    /// current bookings; it is consulted only when confirming.
    pub fn transition_to(
        &mut self,
        target: BookingStatus,
        room_bookings: &[Booking],
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let from = self.status;
        if from == target {
            return Ok(Transition::Unchanged);
        }
        if !from.can_transition_to(target) {
            return Err(TransitionError::NotAllowed { from, to: target });
        }
        if target.is_blocking() {
            let others = room_bookings.iter().filter(|b| b.id != self.id);
            if let Some(existing) = overlap::find_conflict(self.room_id, &self.stay, others) {
                return Err(TransitionError::Conflict(Box::new(existing.clone())));
            }
        }

        self.status = target;
        self.updated_at = now;
        Ok(Transition::Applied { from })
    }
}

/// nights x nightly price. Only ever called when a booking is created.
pub fn quote_total(room: &Room, stay: &StayDates) -> BigDecimal {
    room.price_per_night.clone() * BigDecimal::from(stay.nights())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Applied { from: BookingStatus },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("cannot move booking from {from} to {to}")]
    NotAllowed {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("room already confirmed for {} by booking {}", .0.stay, .0.id)]
    Conflict(Box<Booking>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn room() -> Room {
        Room {
            id: 10,
            hotel_id: 1,
            room_number: "101".to_string(),
            room_type: "Deluxe".to_string(),
            price_per_night: "100.00".parse().unwrap(),
            capacity: 2,
            available: true,
        }
    }

    fn booking(check_in: &str, check_out: &str, status: BookingStatus) -> Booking {
        let stay = StayDates::new(date(check_in), date(check_out)).unwrap();
        let mut b = Booking::new_pending(1, &room(), stay, 2, GuestInfo::default(), Utc::now());
        b.status = status;
        b
    }

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert!(StayDates::new(date("2025-01-10"), date("2025-01-10")).is_err());
        assert!(StayDates::new(date("2025-01-11"), date("2025-01-10")).is_err());
        assert!(StayDates::new(date("2025-01-10"), date("2025-01-11")).is_ok());
    }

    #[test]
    fn total_is_nights_times_price() {
        let b = booking("2025-01-10", "2025-01-13", BookingStatus::Pending);
        assert_eq!(b.nights(), 3);
        assert_eq!(b.total_amount, "300.00".parse::<BigDecimal>().unwrap());
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[test]
    fn transition_table() {
        use BookingStatus::*;
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Confirmed, Completed),
        ];
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn same_status_is_a_no_op() {
        let mut b = booking("2025-01-10", "2025-01-12", BookingStatus::Cancelled);
        let before = b.updated_at;
        let outcome = b.transition_to(BookingStatus::Cancelled, &[], Utc::now()).unwrap();
        assert_eq!(outcome, Transition::Unchanged);
        assert_eq!(b.updated_at, before);
    }

    #[test]
    fn terminal_states_reject_changes() {
        let mut b = booking("2025-01-10", "2025-01-12", BookingStatus::Cancelled);
        let err = b.transition_to(BookingStatus::Confirmed, &[], Utc::now()).unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
        assert_eq!(b.status, BookingStatus::Cancelled);
    }

    #[test]
    fn confirm_checks_other_confirmed_bookings() {
        let held = booking("2025-01-10", "2025-01-15", BookingStatus::Confirmed);
        let mut candidate = booking("2025-01-12", "2025-01-13", BookingStatus::Pending);
        let err = candidate
            .transition_to(BookingStatus::Confirmed, &[held.clone()], Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Conflict(ref b) if b.id == held.id));
        assert_eq!(candidate.status, BookingStatus::Pending);

        let mut next = booking("2025-01-15", "2025-01-17", BookingStatus::Pending);
        let outcome = next
            .transition_to(BookingStatus::Confirmed, &[held], Utc::now())
            .unwrap();
        assert_eq!(outcome, Transition::Applied { from: BookingStatus::Pending });
    }

    #[test]
    fn confirm_ignores_itself() {
        let mut b = booking("2025-01-10", "2025-01-12", BookingStatus::Pending);
        let snapshot = vec![b.clone()];
        assert!(b.transition_to(BookingStatus::Confirmed, &snapshot, Utc::now()).is_ok());
    }

    #[test]
    fn parses_status_case_insensitively() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!(" PENDING ".parse::<BookingStatus>().unwrap(), BookingStatus::Pending);
        assert!("BOOKED".parse::<BookingStatus>().is_err());
    }
}
