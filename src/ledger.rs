use crate::domain::{SeatReservation, SeatReservationStatus};
use crate::store::StateStore;
use crate::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

/// Record book for individual seat holds.
///
/// The ledger owns the reservation state machines; whoever wins a seat at
/// the arbiter gets exactly one Reserved record here, and that record only
/// moves forward: to Confirmed, or to a settled state it never leaves.
#[derive(Clone, Default)]
pub struct ReservationLedger {
    reservations: StateStore<Uuid, SeatReservation>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self {
            reservations: StateStore::new(),
        }
    }

    pub fn create(
        &self,
        seat_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        price: Decimal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SeatReservation> {
        let reservation = SeatReservation::new(seat_id, event_id, user_id, price, ttl, now)?;
        self.reservations.put(reservation.id, reservation.clone());
        debug!(
            reservation_id = %reservation.id,
            seat_id = %seat_id,
            event_id = %event_id,
            expires_at = %reservation.expires_at,
            "Reservation created"
        );
        Ok(reservation)
    }

    pub fn get(&self, reservation_id: Uuid) -> Result<SeatReservation> {
        self.reservations.get(&reservation_id).ok_or_else(|| {
            BookingError::NotFound(format!("Reservation {} not found", reservation_id))
        })
    }

    pub fn confirm(
        &self,
        reservation_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_reservation(reservation_id, |r| r.confirm(booking_id, now))
    }

    pub fn release(
        &self,
        reservation_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_reservation(reservation_id, |r| r.release(reason, now))
    }

    pub fn cancel(
        &self,
        reservation_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_reservation(reservation_id, |r| {
            r.cancel(reason, now);
            Ok(())
        })
    }

    /// Transitions Reserved past its deadline to Expired. Anything else is
    /// a no-op, so repeated sweep passes converge. Returns whether this call
    /// made the transition.
    pub fn expire(&self, reservation_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_reservation(reservation_id, |r| Ok(r.mark_expired(now)))
    }

    pub fn extend_until(
        &self,
        reservation_id: Uuid,
        new_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_reservation(reservation_id, |r| r.extend_until(new_deadline, now))
    }

    /// Puts a confirmed record back to Reserved after a multi-seat
    /// confirmation failed partway through.
    pub fn revert_confirmation(&self, reservation_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_reservation(reservation_id, |r| {
            r.revert_confirmation(now);
            Ok(())
        })
    }

    /// Reserved entries past their deadline. The sweeper expires these and
    /// frees their seats; expiring the owning booking later is a no-op on
    /// the seat side.
    pub fn expired_reserved(&self, now: DateTime<Utc>) -> Vec<SeatReservation> {
        let mut out = Vec::new();
        self.reservations.for_each(|_, r| {
            if r.status == SeatReservationStatus::Reserved && now > r.expires_at {
                out.push(r.clone());
            }
        });
        out
    }

    /// Active (Reserved or Confirmed) reservation for a seat at an event,
    /// if one exists.
    pub fn active_for_seat(&self, event_id: Uuid, seat_id: Uuid) -> Option<SeatReservation> {
        let mut found = None;
        self.reservations.for_each(|_, r| {
            if r.event_id == event_id && r.seat_id == seat_id && r.status.holds_seat() {
                found = Some(r.clone());
            }
        });
        found
    }

    fn with_reservation<R>(
        &self,
        reservation_id: Uuid,
        f: impl FnOnce(&mut SeatReservation) -> Result<R>,
    ) -> Result<R> {
        self.reservations
            .with_entry_mut(&reservation_id, f)
            .ok_or_else(|| {
                BookingError::NotFound(format!("Reservation {} not found", reservation_id))
            })?
    }
}
