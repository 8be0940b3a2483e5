use crate::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatReservationStatus {
    /// Temporary hold, waiting for payment.
    Reserved,
    /// Paid for; only an explicit refund path undoes this.
    Confirmed,
    Expired,
    Released,
    Cancelled,
}

impl SeatReservationStatus {
    /// Expired, Released, or Cancelled; these never change again.
    pub fn is_settled(self) -> bool {
        !self.holds_seat()
    }

    /// Counts against seat availability.
    pub fn holds_seat(self) -> bool {
        matches!(
            self,
            SeatReservationStatus::Reserved | SeatReservationStatus::Confirmed
        )
    }
}

/// A time-boxed claim on one seat for one event.
///
/// `Reserved` moves forward exactly once: either to `Confirmed` or to one
/// of the settled states. `Confirmed` can still be cancelled for a refund;
/// the settled states never change again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatReservation {
    pub id: Uuid,
    pub seat_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    /// Linked when the owning booking confirms.
    pub booking_id: Option<Uuid>,
    pub status: SeatReservationStatus,
    /// base price x pricing tier, fixed at reservation time.
    pub price: Decimal,
    pub expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatReservation {
    pub fn new(
        seat_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        price: Decimal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if price <= Decimal::ZERO {
            return Err(BookingError::Validation(
                "Reservation price must be positive".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            seat_id,
            event_id,
            user_id,
            booking_id: None,
            status: SeatReservationStatus::Reserved,
            price,
            expires_at: now + ttl,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatReservationStatus::Reserved && now > self.expires_at
    }

    pub fn confirm(&mut self, booking_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if self.status != SeatReservationStatus::Reserved {
            return Err(BookingError::InvalidState(
                "Only reserved seats can be confirmed".to_string(),
            ));
        }
        if self.is_expired(now) {
            return Err(BookingError::Expired(format!(
                "Reservation {} expired at {}",
                self.id, self.expires_at
            )));
        }
        self.booking_id = Some(booking_id);
        self.status = SeatReservationStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    pub fn release(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<()> {
        if self.status == SeatReservationStatus::Confirmed {
            return Err(BookingError::InvalidState(
                "Cannot release confirmed reservation".to_string(),
            ));
        }
        self.status = SeatReservationStatus::Released;
        self.notes = reason;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels a reservation that still holds its seat. Reserved holds
    /// cancel with the booking; Confirmed ones cancel through the refund
    /// path. Settled states stay where they are, so a cancel racing an
    /// expiry sweep is a no-op.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) {
        if self.status.is_settled() {
            return;
        }
        self.status = SeatReservationStatus::Cancelled;
        self.notes = reason;
        self.updated_at = now;
    }

    /// Reserved past its deadline becomes Expired; anything else is left
    /// alone so repeated sweep passes are harmless.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            self.status = SeatReservationStatus::Expired;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// Moves the hold's deadline out to `new_deadline`. Extensions only
    /// push forward; a deadline behind the current one is left alone.
    pub fn extend_until(&mut self, new_deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if self.status != SeatReservationStatus::Reserved {
            return Err(BookingError::InvalidState(
                "Can only extend active reservations".to_string(),
            ));
        }
        if self.is_expired(now) {
            return Err(BookingError::Expired(format!(
                "Reservation {} expired at {}",
                self.id, self.expires_at
            )));
        }
        self.expires_at = self.expires_at.max(new_deadline);
        self.updated_at = now;
        Ok(())
    }

    /// Puts a confirmed reservation back to Reserved. Compensation for a
    /// multi-seat confirmation that failed partway through; anything else
    /// is left alone.
    pub(crate) fn revert_confirmation(&mut self, now: DateTime<Utc>) {
        if self.status == SeatReservationStatus::Confirmed {
            self.status = SeatReservationStatus::Reserved;
            self.booking_id = None;
            self.updated_at = now;
        }
    }
}
