pub mod availability;
pub mod booking;
pub mod payment;

pub use availability::AvailabilityService;
pub use booking::{BookingService, NewBooking};
pub use payment::{InitiatedPayment, PaymentService};
