use crate::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Created but not yet open for booking.
    Draft,
    /// Published and accepting bookings.
    Live,
    Cancelled,
    Completed,
}

/// An event at a venue, carrying the seat counters that are the source of
/// truth for "how many seats are left".
///
/// The `available + booked == total` invariant holds at all times; the
/// counters only move through [`Event::reserve_seats`] and
/// [`Event::release_seats`], never by direct assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub venue_id: Uuid,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub base_price: Decimal,
    pub total_seats: u32,
    pub available_seats: u32,
    pub booked_seats: u32,
    pub booking_opens_at: DateTime<Utc>,
    pub booking_closes_at: DateTime<Utc>,
    pub allow_waitlist: bool,
    pub max_seats_per_booking: u32,
    pub published_at: Option<DateTime<Utc>>,
}

impl Event {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        venue_id: Uuid,
        description: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        base_price: Decimal,
        total_seats: u32,
        max_seats_per_booking: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(BookingError::Validation(
                "Event title is required".to_string(),
            ));
        }
        if start_time < now + Duration::hours(1) {
            return Err(BookingError::Validation(
                "Event start time must be at least 1 hour in the future".to_string(),
            ));
        }
        if end_time <= start_time {
            return Err(BookingError::Validation(
                "Event end time must be after start time".to_string(),
            ));
        }
        if base_price < Decimal::ZERO {
            return Err(BookingError::Validation(
                "Base price cannot be negative".to_string(),
            ));
        }
        if total_seats == 0 {
            return Err(BookingError::Validation(
                "Total seats must be greater than 0".to_string(),
            ));
        }
        if max_seats_per_booking == 0 || max_seats_per_booking > 20 {
            return Err(BookingError::Validation(
                "Max seats per booking must be between 1 and 20".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            venue_id,
            description: description.to_string(),
            start_time,
            end_time,
            status: EventStatus::Draft,
            base_price,
            total_seats,
            available_seats: total_seats,
            booked_seats: 0,
            // Booking window defaults: opens a week out, closes an hour
            // before doors.
            booking_opens_at: start_time - Duration::days(7),
            booking_closes_at: start_time - Duration::hours(1),
            allow_waitlist: true,
            max_seats_per_booking,
            published_at: None,
        })
    }

    pub fn with_booking_window(
        mut self,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<Self> {
        if closes_at <= opens_at {
            return Err(BookingError::Validation(
                "Booking close must be after booking open".to_string(),
            ));
        }
        self.booking_opens_at = opens_at;
        self.booking_closes_at = closes_at;
        Ok(self)
    }

    pub fn publish(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != EventStatus::Draft {
            return Err(BookingError::InvalidState(
                "Only draft events can be published".to_string(),
            ));
        }
        self.status = EventStatus::Live;
        self.published_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        match self.status {
            EventStatus::Completed => Err(BookingError::InvalidState(
                "Cannot cancel completed events".to_string(),
            )),
            EventStatus::Cancelled => Err(BookingError::InvalidState(
                "Event is already cancelled".to_string(),
            )),
            _ => {
                self.status = EventStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != EventStatus::Live {
            return Err(BookingError::InvalidState(
                "Only live events can be completed".to_string(),
            ));
        }
        if now < self.end_time {
            return Err(BookingError::InvalidState(
                "Cannot complete event before end time".to_string(),
            ));
        }
        self.status = EventStatus::Completed;
        Ok(())
    }

    pub fn update_pricing(&mut self, base_price: Decimal) -> Result<()> {
        if self.status == EventStatus::Live && self.booked_seats > 0 {
            return Err(BookingError::InvalidState(
                "Cannot change pricing for live events with existing bookings".to_string(),
            ));
        }
        if base_price < Decimal::ZERO {
            return Err(BookingError::Validation(
                "Base price cannot be negative".to_string(),
            ));
        }
        self.base_price = base_price;
        Ok(())
    }

    pub fn is_booking_open(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Live
            && now >= self.booking_opens_at
            && now <= self.booking_closes_at
            && self.available_seats > 0
    }

    pub fn can_accept_waitlist(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Live
            && self.allow_waitlist
            && self.available_seats == 0
            && now <= self.booking_closes_at
    }

    /// Moves `seat_count` seats from available to booked. Callers must have
    /// already won the per-seat contention; this only guards the counters.
    pub fn reserve_seats(&mut self, seat_count: u32, now: DateTime<Utc>) -> Result<()> {
        if self.status != EventStatus::Live {
            return Err(BookingError::InvalidState(format!(
                "Event {} is not live for booking",
                self.id
            )));
        }
        if seat_count == 0 || seat_count > self.max_seats_per_booking {
            return Err(BookingError::Validation(format!(
                "Cannot book more than {} seats per booking",
                self.max_seats_per_booking
            )));
        }
        if now < self.booking_opens_at || now > self.booking_closes_at {
            return Err(BookingError::InvalidState(
                "Booking is not currently open for this event".to_string(),
            ));
        }
        if self.available_seats < seat_count {
            return Err(BookingError::Availability {
                conflicting_seats: Vec::new(),
            });
        }

        self.available_seats -= seat_count;
        self.booked_seats += seat_count;
        Ok(())
    }

    /// Moves `seat_count` seats from booked back to available.
    pub fn release_seats(&mut self, seat_count: u32) -> Result<()> {
        if seat_count == 0 {
            return Ok(());
        }
        if seat_count > self.booked_seats {
            return Err(BookingError::Validation(
                "Invalid seat count to release".to_string(),
            ));
        }
        self.available_seats += seat_count;
        self.booked_seats -= seat_count;
        Ok(())
    }
}
