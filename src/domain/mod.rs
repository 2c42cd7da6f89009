//! Framework-agnostic booking domain.
//! Entities, the lifecycle transition table, and the date-overlap rule.

pub mod booking;
pub mod catalog;
pub mod overlap;
pub mod payment;

pub use booking::{Booking, BookingStatus, GuestInfo, StayDates, Transition, TransitionError};
pub use catalog::{Hotel, Room, User};
pub use payment::{Payment, PaymentMethod, PaymentStatus};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
