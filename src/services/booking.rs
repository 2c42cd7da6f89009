use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, GuestInfo, StayDates, Transition};
use crate::error::CoreError;
use crate::ports::{
    BookingFilter, BookingRepository, CatalogStore, RepositoryError, UserDirectory,
};

/// Everything `create` needs besides the acting user.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub hotel_id: i64,
    pub room_id: i64,
    pub stay: StayDates,
    pub guests: i32,
    pub guest: GuestInfo,
}

/// Owns booking creation and every booking status change.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogStore>,
    users: Arc<dyn UserDirectory>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            bookings,
            catalog,
            users,
        }
    }

    pub async fn create(&self, user_id: i64, request: NewBooking) -> Result<Booking, CoreError> {
        self.users
            .find_user(user_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("user {}", user_id)))?;
        self.catalog
            .find_hotel(request.hotel_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("hotel {}", request.hotel_id)))?;
        let room = self
            .catalog
            .find_room(request.room_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("room {}", request.room_id)))?;

        if room.hotel_id != request.hotel_id {
            return Err(CoreError::NotFound(format!(
                "room {} in hotel {}",
                request.room_id, request.hotel_id
            )));
        }
        if request.guests < 1 {
            return Err(CoreError::Validation("at least one guest is required".to_string()));
        }
        if request.guests > room.capacity {
            return Err(CoreError::Validation(format!(
                "room {} holds at most {} guests",
                room.id, room.capacity
            )));
        }

        let booking = Booking::new_pending(
            user_id,
            &room,
            request.stay,
            request.guests,
            request.guest,
            Utc::now(),
        );

        let saved = self
            .bookings
            .insert_if_available(&booking)
            .await
            .map_err(|e| stay_error(e, &booking))?;

        tracing::info!(
            booking_id = %saved.id,
            user_id,
            room_id = saved.room_id,
            stay = %saved.stay,
            total = %saved.total_amount,
            "Booking created"
        );
        Ok(saved)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Booking>, CoreError> {
        self.bookings
            .list_for_user(user_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("bookings of user {}", user_id)))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Booking, CoreError> {
        self.bookings
            .get(id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("booking {}", id)))
    }

    /// `get_by_id` restricted to the booking's owner.
    pub async fn get_for_user(&self, user_id: i64, id: Uuid) -> Result<Booking, CoreError> {
        let booking = self.get_by_id(id).await?;
        ensure_owner(&booking, user_id)?;
        Ok(booking)
    }

    /// Cancels a booking on behalf of its owner. Cancelling twice succeeds.
    pub async fn cancel(&self, user_id: i64, id: Uuid) -> Result<Booking, CoreError> {
        let booking = self.get_by_id(id).await?;
        ensure_owner(&booking, user_id)?;
        self.transition(&booking, BookingStatus::Cancelled)
            .await
            .map(|(booking, _)| booking)
    }

    /// Administrative status change. Skips the ownership check but not the
    /// transition table.
    pub async fn admin_set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, CoreError> {
        self.set_status(id, status).await.map(|(booking, _)| booking)
    }

    /// Like `admin_set_status`, also reporting whether the booking moved.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(Booking, Transition), CoreError> {
        let booking = self.get_by_id(id).await?;
        self.transition(&booking, status).await
    }

    pub async fn list_admin(&self, filter: &BookingFilter) -> Result<Vec<Booking>, CoreError> {
        self.bookings
            .list(filter)
            .await
            .map_err(|e| CoreError::from_repository(e, "bookings"))
    }

    async fn transition(
        &self,
        booking: &Booking,
        target: BookingStatus,
    ) -> Result<(Booking, Transition), CoreError> {
        let (updated, outcome) = self
            .bookings
            .transition(booking.id, target, Utc::now())
            .await
            .map_err(|e| stay_error(e, booking))?;

        match outcome {
            Transition::Applied { from } => tracing::info!(
                booking_id = %updated.id,
                from = %from,
                to = %updated.status,
                "Booking status changed"
            ),
            Transition::Unchanged => tracing::debug!(
                booking_id = %updated.id,
                status = %updated.status,
                "Booking already in requested status"
            ),
        }
        Ok((updated, outcome))
    }
}

fn ensure_owner(booking: &Booking, user_id: i64) -> Result<(), CoreError> {
    if booking.user_id != user_id {
        tracing::warn!(
            booking_id = %booking.id,
            user_id,
            "Rejected access to another user's booking"
        );
        return Err(CoreError::Unauthorized(format!(
            "booking {} belongs to another user",
            booking.id
        )));
    }
    Ok(())
}

/// Attributes a storage conflict to the stay that was being written.
fn stay_error(e: RepositoryError, booking: &Booking) -> CoreError {
    match e {
        RepositoryError::Conflict(existing) => {
            CoreError::conflict(booking.room_id, &booking.stay, existing.as_deref())
        }
        other => CoreError::from_repository(other, format!("booking {}", booking.id)),
    }
}
