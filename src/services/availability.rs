use std::sync::Arc;

use crate::domain::{overlap, Room, StayDates};
use crate::error::CoreError;
use crate::ports::{BookingRepository, CatalogStore};

/// Read-only answer to "which rooms of a hotel are free for a stay".
pub struct AvailabilityService {
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogStore>,
}

impl AvailabilityService {
    pub fn new(bookings: Arc<dyn BookingRepository>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { bookings, catalog }
    }

    /// Rooms of `hotel_id` with no confirmed booking overlapping `stay`,
    /// optionally narrowed to rooms that fit `guests`.
    pub async fn search(
        &self,
        hotel_id: i64,
        stay: &StayDates,
        guests: Option<i32>,
    ) -> Result<Vec<Room>, CoreError> {
        self.catalog
            .find_hotel(hotel_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("hotel {}", hotel_id)))?;
        let rooms = self
            .catalog
            .rooms_for_hotel(hotel_id)
            .await
            .map_err(|e| CoreError::from_repository(e, format!("rooms of hotel {}", hotel_id)))?;

        let mut free = Vec::with_capacity(rooms.len());
        for room in rooms {
            if guests.is_some_and(|g| g > room.capacity) {
                continue;
            }
            let holders = self
                .bookings
                .blocking_for_room(room.id, stay)
                .await
                .map_err(|e| {
                    CoreError::from_repository(e, format!("bookings of room {}", room.id))
                })?;
            if !overlap::is_blocked(room.id, stay, &holders) {
                free.push(room);
            }
        }

        tracing::debug!(hotel_id, stay = %stay, free = free.len(), "Availability computed");
        Ok(free)
    }
}
