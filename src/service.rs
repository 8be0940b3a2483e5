use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arbiter::{InMemorySeatLock, SeatLockService};
use crate::clock::{Clock, SharedClock, SystemClock};
use crate::config::EngineConfig;
use crate::domain::booking::{generate_ticket_code, round_money};
use crate::domain::{
    Booking, BookingStatus, Event, PaymentMethod, PriceBreakdown, Seat, SeatReservationStatus,
    SeatType, Venue, VenueType,
};
use crate::error::{BookingError, Result};
use crate::inventory::{SeatHold, SeatInventory};
use crate::ledger::ReservationLedger;
use crate::metrics::Metrics;
use crate::store::StateStore;

/// Outcome of a successful reservation: a pending booking holding the seats
/// until payment or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingInitiation {
    pub booking_id: Uuid,
    pub reference: String,
    pub reservation_ids: Vec<Uuid>,
    pub pricing: PriceBreakdown,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub reference: String,
    pub ticket_codes: Vec<String>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancellation {
    pub booking_id: Uuid,
    /// Grand total for a confirmed booking cancelled inside the allowed
    /// window, zero otherwise.
    pub refund_amount: Decimal,
    pub released_seat_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatAvailability {
    Available,
    Reserved,
    Booked,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAvailabilityInfo {
    pub seat_id: Uuid,
    pub seat_code: String,
    pub section_code: String,
    pub seat_type: SeatType,
    pub status: SeatAvailability,
    pub price: Decimal,
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

/// Point-in-time availability snapshot for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub event_id: Uuid,
    pub total_seats: u32,
    pub available_seats: u32,
    pub reserved_seats: u32,
    pub booked_seats: u32,
    pub available_by_section: HashMap<String, u32>,
    pub seats: Vec<SeatAvailabilityInfo>,
    pub taken_at: DateTime<Utc>,
}

/// The booking engine. Owns the catalog, the live seat inventory, the
/// reservation ledger and the seat lock, and drives every lifecycle
/// transition through them.
///
/// Cloning is cheap and every clone shares state, so the service can be
/// handed to as many tasks as needed.
#[derive(Clone)]
pub struct BookingService {
    config: EngineConfig,
    clock: SharedClock,
    venues: StateStore<Uuid, Venue>,
    inventory: SeatInventory,
    ledger: ReservationLedger,
    bookings: StateStore<Uuid, Booking>,
    arbiter: Arc<dyn SeatLockService>,
    metrics: Metrics,
}

impl BookingService {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds the service on an injected clock. Tests drive TTL expiry by
    /// advancing a `ManualClock` instead of sleeping.
    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> Result<Self> {
        let arbiter: Arc<dyn SeatLockService> =
            Arc::new(InMemorySeatLock::new(clock.clone(), config.lock_lease()));
        Ok(Self {
            config,
            clock,
            venues: StateStore::new(),
            inventory: SeatInventory::new(),
            ledger: ReservationLedger::new(),
            bookings: StateStore::new(),
            arbiter,
            metrics: Metrics::new()?,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn arbiter(&self) -> &Arc<dyn SeatLockService> {
        &self.arbiter
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn inventory(&self) -> &SeatInventory {
        &self.inventory
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub fn register_venue(&self, name: &str, city: &str, venue_type: VenueType) -> Result<Venue> {
        let venue = Venue::new(name, city, venue_type)?;
        info!(venue_id = %venue.id, name = %venue.name, "Venue registered");
        self.venues.put(venue.id, venue.clone());
        Ok(venue)
    }

    pub fn add_seat(
        &self,
        venue_id: Uuid,
        section_code: &str,
        row_code: &str,
        seat_number: u32,
        seat_type: SeatType,
        pricing_tier: Decimal,
    ) -> Result<Seat> {
        let seat = Seat::new(
            venue_id,
            section_code,
            row_code,
            seat_number,
            seat_type,
            pricing_tier,
        )?;
        let stored = seat.clone();
        self.venues
            .with_entry_mut(&venue_id, |venue| venue.add_seat(stored))
            .ok_or_else(|| BookingError::NotFound(format!("Venue {} not found", venue_id)))??;
        Ok(seat)
    }

    /// Takes a seat out of sale. Existing holds on it are untouched; it
    /// just stops being offered.
    pub fn retire_seat(
        &self,
        venue_id: Uuid,
        seat_id: Uuid,
        reason: Option<String>,
    ) -> Result<()> {
        self.venues
            .with_entry_mut(&venue_id, |venue| {
                match venue.seats.iter_mut().find(|s| s.id == seat_id) {
                    Some(seat) => {
                        seat.deactivate(reason);
                        Ok(())
                    }
                    None => Err(BookingError::NotFound(format!(
                        "Seat {} not found at venue {}",
                        seat_id, venue_id
                    ))),
                }
            })
            .ok_or_else(|| BookingError::NotFound(format!("Venue {} not found", venue_id)))?
    }

    pub fn deactivate_venue(&self, venue_id: Uuid) -> Result<()> {
        self.venues
            .with_entry_mut(&venue_id, |venue| venue.deactivate())
            .ok_or_else(|| BookingError::NotFound(format!("Venue {} not found", venue_id)))
    }

    /// Whether a sold-out event is taking waitlist interest.
    pub fn waitlist_open(&self, event_id: Uuid) -> Result<bool> {
        let now = self.now();
        Ok(self.inventory.event(event_id)?.can_accept_waitlist(now))
    }

    pub fn venue(&self, venue_id: Uuid) -> Result<Venue> {
        self.venues
            .get(&venue_id)
            .ok_or_else(|| BookingError::NotFound(format!("Venue {} not found", venue_id)))
    }

    /// Creates a draft event sized to the venue's active seats.
    #[allow(clippy::too_many_arguments)]
    pub fn create_event(
        &self,
        title: &str,
        venue_id: Uuid,
        description: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        base_price: Decimal,
        max_seats_per_booking: u32,
    ) -> Result<Event> {
        let venue = self.venue(venue_id)?;
        if !venue.is_active {
            return Err(BookingError::Validation(format!(
                "Venue {} is not active",
                venue_id
            )));
        }
        let total_seats = venue.active_seats().count() as u32;
        let event = Event::new(
            title,
            venue_id,
            description,
            start_time,
            end_time,
            base_price,
            total_seats,
            max_seats_per_booking,
            self.now(),
        )?;
        info!(event_id = %event.id, title = %event.title, total_seats, "Event created");
        self.inventory.insert_event(event.clone());
        Ok(event)
    }

    pub fn set_booking_window(
        &self,
        event_id: Uuid,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inventory.with_event_mut(event_id, |event| {
            if closes_at <= opens_at {
                return Err(BookingError::Validation(
                    "Booking window must close after it opens".to_string(),
                ));
            }
            event.booking_opens_at = opens_at;
            event.booking_closes_at = closes_at;
            Ok(())
        })
    }

    pub fn publish_event(&self, event_id: Uuid) -> Result<()> {
        let now = self.now();
        self.inventory
            .with_event_mut(event_id, |event| event.publish(now))
    }

    pub fn cancel_event(&self, event_id: Uuid) -> Result<()> {
        self.inventory.with_event_mut(event_id, |event| event.cancel())
    }

    pub fn complete_event(&self, event_id: Uuid) -> Result<()> {
        let now = self.now();
        self.inventory
            .with_event_mut(event_id, |event| event.complete(now))
    }

    pub fn update_event_pricing(&self, event_id: Uuid, base_price: Decimal) -> Result<()> {
        self.inventory
            .with_event_mut(event_id, |event| event.update_pricing(base_price))
    }

    pub fn event(&self, event_id: Uuid) -> Result<Event> {
        self.inventory.event(event_id)
    }

    pub fn booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.bookings
            .get(&booking_id)
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Reserves the requested seats for one user and opens a pending
    /// booking over them.
    ///
    /// The seats are locked first, so concurrent requests for an
    /// overlapping set serialize: one caller gets all of its seats, the
    /// rest fail with the conflicting ids. Any failure after the inventory
    /// hold rolls the hold back before returning.
    pub async fn reserve_seats(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        seat_ids: &[Uuid],
        customer_email: &str,
        customer_phone: &str,
    ) -> Result<BookingInitiation> {
        let now = self.now();
        let event = self.inventory.event(event_id)?;
        let venue = self.venue(event.venue_id)?;

        // Price every seat up front; a missing or retired seat fails the
        // whole request before anything is held.
        let mut seat_prices = Vec::with_capacity(seat_ids.len());
        for &seat_id in seat_ids {
            let seat = venue.seat(seat_id).ok_or_else(|| {
                BookingError::NotFound(format!("Seat {} not found at venue {}", seat_id, venue.id))
            })?;
            if !seat.is_active {
                return Err(BookingError::Validation(format!(
                    "Seat {} is not available for sale",
                    seat.seat_code()
                )));
            }
            seat_prices.push((seat_id, round_money(event.base_price * seat.pricing_tier)));
        }

        let wait_started = Instant::now();
        let grant = match self
            .arbiter
            .acquire(event_id, seat_ids, user_id, self.config.lock_acquire_timeout())
            .await
        {
            Ok(grant) => grant,
            Err(err) => {
                self.metrics.record_reservation_attempt(false, 0);
                return Err(err);
            }
        };
        self.metrics
            .lock_wait_duration
            .observe(wait_started.elapsed().as_secs_f64());

        let result = self
            .reserve_under_lock(event_id, user_id, &seat_prices, customer_email, customer_phone, now);

        // The inventory hold outlives the lock; the lock only ordered the
        // attempt.
        if let Err(err) = self.arbiter.release(&grant).await {
            warn!(token = %grant.token, error = %err, "Seat lock release failed");
        }

        match &result {
            Ok(initiation) => {
                self.metrics
                    .record_reservation_attempt(true, seat_ids.len());
                self.metrics.bookings_created.inc();
                self.refresh_available_gauge(event_id);
                info!(
                    booking_id = %initiation.booking_id,
                    reference = %initiation.reference,
                    event_id = %event_id,
                    seats = seat_ids.len(),
                    total = %initiation.pricing.grand_total,
                    "Booking initiated"
                );
            }
            Err(err) => {
                self.metrics.record_reservation_attempt(false, 0);
                debug!(event_id = %event_id, user_id = %user_id, error = %err, "Reservation failed");
            }
        }
        result
    }

    fn reserve_under_lock(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        seat_prices: &[(Uuid, Decimal)],
        customer_email: &str,
        customer_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<BookingInitiation> {
        let seat_ids: Vec<Uuid> = seat_prices.iter().map(|(id, _)| *id).collect();
        self.inventory.try_reserve(event_id, &seat_ids, user_id, now)?;

        let build = || -> Result<Booking> {
            let mut reservations = Vec::with_capacity(seat_prices.len());
            for &(seat_id, price) in seat_prices {
                reservations.push(self.ledger.create(
                    seat_id,
                    event_id,
                    user_id,
                    price,
                    self.config.reservation_ttl(),
                    now,
                )?);
            }
            Booking::new(
                user_id,
                event_id,
                customer_email,
                customer_phone,
                reservations,
                self.config.service_fee_rate,
                self.config.tax_rate,
                self.config.booking_ttl(),
                now,
            )
        };

        match build() {
            Ok(booking) => {
                let initiation = BookingInitiation {
                    booking_id: booking.id,
                    reference: booking.reference.clone(),
                    reservation_ids: booking.reservations.iter().map(|r| r.id).collect(),
                    pricing: booking.pricing,
                    expires_at: booking.expires_at,
                };
                self.bookings.put(booking.id, booking);
                Ok(initiation)
            }
            Err(err) => {
                // Undo the hold and any ledger rows already written.
                for &(seat_id, _) in seat_prices {
                    if let Some(r) = self.ledger.active_for_seat(event_id, seat_id) {
                        if r.user_id == user_id && r.status == SeatReservationStatus::Reserved {
                            let _ = self.ledger.release(
                                r.id,
                                Some("Rolled back: booking creation failed".to_string()),
                                now,
                            );
                        }
                    }
                }
                let _ = self.inventory.release(event_id, &seat_ids, user_id);
                Err(err)
            }
        }
    }

    /// Takes payment and confirms the booking, minting one ticket per seat.
    ///
    /// A booking past its deadline fails with `Expired` and is swept to the
    /// expired state in the same call. Seat holds that lapsed while the
    /// booking was still payable also fail with `Expired`, and go back to
    /// the available pool in the same call, so a later sweeper pass has
    /// nothing left to do for either.
    pub async fn confirm_booking(
        &self,
        booking_id: Uuid,
        payment_method: PaymentMethod,
        payment_transaction_id: &str,
    ) -> Result<BookingConfirmation> {
        let now = self.now();
        let current = self.booking(booking_id)?;
        let venue = self.venue(self.inventory.event(current.event_id)?.venue_id)?;

        let outcome = self
            .bookings
            .with_entry_mut(&booking_id, |entry| -> Result<BookingConfirmation> {
                // Mutate a scratch copy; the stored booking only changes on
                // transitions that fully went through.
                let mut booking = entry.clone();

                if booking.mark_expired(now) {
                    let expired: Vec<_> = booking
                        .reservations
                        .iter()
                        .filter(|r| r.status == SeatReservationStatus::Expired)
                        .map(|r| (r.id, r.seat_id))
                        .collect();
                    *entry = booking;
                    self.cleanup_expired_children(
                        booking_id,
                        entry.event_id,
                        entry.user_id,
                        &expired,
                        now,
                    );
                    self.metrics.bookings_expired.inc();
                    return Err(BookingError::Expired(format!(
                        "Booking {} expired before payment",
                        booking_id
                    )));
                }

                // Holds that lapsed while the booking itself was still
                // payable fail the confirmation and go back to the pool
                // right away.
                let lapsed: Vec<(Uuid, Uuid)> = booking
                    .reservations
                    .iter()
                    .filter(|r| r.is_expired(now))
                    .map(|r| (r.id, r.seat_id))
                    .collect();
                if !lapsed.is_empty() {
                    for r in booking.reservations.iter_mut() {
                        r.mark_expired(now);
                    }
                    let event_id = booking.event_id;
                    let user_id = booking.user_id;
                    *entry = booking;
                    self.cleanup_expired_children(booking_id, event_id, user_id, &lapsed, now);
                    self.metrics.seats_released.inc_by(lapsed.len() as f64);
                    return Err(BookingError::Expired(format!(
                        "Seat holds for booking {} lapsed before payment",
                        booking_id
                    )));
                }

                let recomputed = booking
                    .recomputed_total(self.config.service_fee_rate, self.config.tax_rate);
                if recomputed != booking.pricing.grand_total {
                    return Err(BookingError::InvalidState(format!(
                        "Booking {} total drifted: stored {}, recomputed {}",
                        booking_id, booking.pricing.grand_total, recomputed
                    )));
                }

                booking.process_payment(payment_method, payment_transaction_id, now)?;

                let pending: Vec<(Uuid, Uuid)> = booking
                    .reservations
                    .iter()
                    .filter(|r| r.status == SeatReservationStatus::Reserved)
                    .map(|r| (r.id, r.seat_id))
                    .collect();
                booking.confirm_payment(now)?;

                // The ledger rows and holds flip one at a time; on any
                // failure everything already flipped goes back, leaving the
                // booking fully pending.
                let mut confirmed_rows = Vec::with_capacity(pending.len());
                let mut confirmed_holds = Vec::with_capacity(pending.len());
                let mut ticket_codes = Vec::with_capacity(pending.len());
                let mut failure = None;
                for &(reservation_id, seat_id) in &pending {
                    if let Err(err) = self.ledger.confirm(reservation_id, booking_id, now) {
                        failure = Some(err);
                        break;
                    }
                    confirmed_rows.push(reservation_id);
                    if let Err(err) = self.inventory.confirm_hold(booking.event_id, seat_id) {
                        failure = Some(err);
                        break;
                    }
                    confirmed_holds.push(seat_id);
                    let seat_code = venue
                        .seat(seat_id)
                        .map(|s| s.seat_code())
                        .unwrap_or_else(|| seat_id.to_string());
                    ticket_codes.push(generate_ticket_code(&booking.reference, &seat_code));
                }
                if let Some(err) = failure {
                    for &reservation_id in &confirmed_rows {
                        let _ = self.ledger.revert_confirmation(reservation_id, now);
                    }
                    for &seat_id in &confirmed_holds {
                        self.inventory.revert_hold(booking.event_id, seat_id);
                    }
                    warn!(booking_id = %booking_id, error = %err, "Confirmation cascade rolled back");
                    return Err(err);
                }

                let confirmation = BookingConfirmation {
                    booking_id,
                    reference: booking.reference.clone(),
                    ticket_codes,
                    confirmed_at: now,
                };
                *entry = booking;
                Ok(confirmation)
            })
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?;

        match &outcome {
            Ok(confirmation) => {
                self.metrics.bookings_confirmed.inc();
                info!(
                    booking_id = %booking_id,
                    reference = %confirmation.reference,
                    tickets = confirmation.ticket_codes.len(),
                    "Booking confirmed"
                );
            }
            Err(err) => {
                self.refresh_available_gauge(current.event_id);
                debug!(booking_id = %booking_id, error = %err, "Booking confirmation failed");
            }
        }
        outcome
    }

    /// Cancels a booking, releasing held seats back to the pool.
    ///
    /// A confirmed booking can only be cancelled up to the cancellation
    /// window before the event starts, and refunds its grand total when it
    /// is. Pending bookings cancel at any time with no refund due.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<BookingCancellation> {
        let now = self.now();
        let current = self.booking(booking_id)?;
        let event = self.inventory.event(current.event_id)?;
        let window = self.config.cancellation_window();

        let outcome = self
            .bookings
            .with_entry_mut(&booking_id, |entry| -> Result<BookingCancellation> {
                let mut booking = entry.clone();

                if !booking.can_be_cancelled(event.start_time, window, now) {
                    return Err(BookingError::PolicyViolation(format!(
                        "Confirmed bookings can only be cancelled more than {} hours before the event",
                        self.config.cancellation_window_hours
                    )));
                }

                let was_confirmed = booking.status == BookingStatus::Confirmed;
                let held: Vec<(Uuid, Uuid)> = booking
                    .reservations
                    .iter()
                    .filter(|r| r.status.holds_seat())
                    .map(|r| (r.id, r.seat_id))
                    .collect();

                booking.cancel(reason, now)?;

                let mut released_seat_ids = Vec::with_capacity(held.len());
                for &(reservation_id, seat_id) in &held {
                    self.ledger
                        .cancel(reservation_id, Some(reason.to_string()), now)?;
                    if was_confirmed {
                        self.inventory.release_confirmed(booking.event_id, seat_id)?;
                    }
                    released_seat_ids.push(seat_id);
                }
                if !was_confirmed {
                    self.inventory
                        .release(booking.event_id, &released_seat_ids, booking.user_id)?;
                }

                let refund_amount = if was_confirmed {
                    booking.pricing.grand_total
                } else {
                    Decimal::ZERO
                };
                *entry = booking;
                Ok(BookingCancellation {
                    booking_id,
                    refund_amount,
                    released_seat_ids,
                })
            })
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?;

        match &outcome {
            Ok(cancellation) => {
                self.metrics.bookings_cancelled.inc();
                self.metrics
                    .seats_released
                    .inc_by(cancellation.released_seat_ids.len() as f64);
                self.refresh_available_gauge(current.event_id);
                info!(
                    booking_id = %booking_id,
                    refund = %cancellation.refund_amount,
                    seats_released = cancellation.released_seat_ids.len(),
                    "Booking cancelled"
                );
            }
            Err(err) => {
                debug!(booking_id = %booking_id, error = %err, "Booking cancellation rejected");
            }
        }
        outcome
    }

    /// Extends a pending booking's deadline and lines every seat hold up
    /// with it, so no hold can lapse while the booking is still payable.
    pub fn extend_booking(&self, booking_id: Uuid, additional: chrono::Duration) -> Result<DateTime<Utc>> {
        let now = self.now();
        self.bookings
            .with_entry_mut(&booking_id, |entry| -> Result<DateTime<Utc>> {
                let mut booking = entry.clone();
                booking.extend(additional, now)?;
                let new_deadline = booking.expires_at;
                for r in booking
                    .reservations
                    .iter()
                    .filter(|r| r.status == SeatReservationStatus::Reserved)
                {
                    self.ledger.extend_until(r.id, new_deadline, now)?;
                }
                *entry = booking;
                Ok(new_deadline)
            })
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?
    }

    pub fn add_special_requests(&self, booking_id: Uuid, requests: &str) -> Result<()> {
        let now = self.now();
        self.bookings
            .with_entry_mut(&booking_id, |booking| {
                booking.add_special_requests(requests, now)
            })
            .ok_or_else(|| BookingError::NotFound(format!("Booking {} not found", booking_id)))?
    }

    // ------------------------------------------------------------------
    // Expiry
    // ------------------------------------------------------------------

    /// One sweep pass: expires pending bookings past their deadline and
    /// reserved seats past theirs, returning seats to the available pool.
    ///
    /// Idempotent; a second pass over the same state transitions nothing.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let started = Instant::now();
        let mut transitions = 0usize;

        let expired_bookings = self
            .bookings
            .keys_where(|_, b| b.is_expired(now));
        for booking_id in expired_bookings {
            let swept = self.bookings.with_entry_mut(&booking_id, |entry| {
                let mut booking = entry.clone();
                if !booking.mark_expired(now) {
                    return None;
                }
                let expired: Vec<_> = booking
                    .reservations
                    .iter()
                    .filter(|r| r.status == SeatReservationStatus::Expired)
                    .map(|r| (r.id, r.seat_id))
                    .collect();
                let event_id = booking.event_id;
                let user_id = booking.user_id;
                *entry = booking;
                Some((event_id, user_id, expired))
            });
            if let Some(Some((event_id, user_id, expired))) = swept {
                self.cleanup_expired_children(booking_id, event_id, user_id, &expired, now);
                self.metrics.bookings_expired.inc();
                self.refresh_available_gauge(event_id);
                transitions += 1;
                info!(booking_id = %booking_id, "Booking expired");
            }
        }

        // Reservations whose own TTL lapsed while the booking is still
        // inside its longer deadline, plus any true orphans.
        for reservation in self.ledger.expired_reserved(now) {
            match self.ledger.expire(reservation.id, now) {
                Ok(true) => {
                    let _ = self.inventory.release(
                        reservation.event_id,
                        &[reservation.seat_id],
                        reservation.user_id,
                    );
                    self.metrics.seats_released.inc();
                    self.refresh_available_gauge(reservation.event_id);
                    transitions += 1;
                    debug!(
                        reservation_id = %reservation.id,
                        seat_id = %reservation.seat_id,
                        "Reservation expired"
                    );
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(reservation_id = %reservation.id, error = %err, "Expiry sweep skipped reservation");
                }
            }
        }

        self.metrics.record_sweep(transitions, started.elapsed());
        transitions
    }

    /// Mirrors a booking expiry into the ledger and the inventory. Seats
    /// already freed by a reservation-level sweep are left alone.
    fn cleanup_expired_children(
        &self,
        booking_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        children: &[(Uuid, Uuid)],
        now: DateTime<Utc>,
    ) {
        let mut seat_ids = Vec::with_capacity(children.len());
        for &(reservation_id, seat_id) in children {
            match self.ledger.expire(reservation_id, now) {
                Ok(_) => seat_ids.push(seat_id),
                Err(err) => {
                    warn!(
                        booking_id = %booking_id,
                        reservation_id = %reservation_id,
                        error = %err,
                        "Ledger expiry failed during booking expiry"
                    );
                    seat_ids.push(seat_id);
                }
            }
        }
        if let Err(err) = self.inventory.release(event_id, &seat_ids, user_id) {
            warn!(booking_id = %booking_id, error = %err, "Seat release failed during booking expiry");
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Per-seat availability for an event, with section tallies. Reads the
    /// hold table directly; counters and the per-seat list come from the
    /// same snapshot of each entry.
    pub fn availability(&self, event_id: Uuid) -> Result<AvailabilitySnapshot> {
        let now = self.now();
        let event = self.inventory.event(event_id)?;
        let venue = self.venue(event.venue_id)?;

        let mut seats = Vec::with_capacity(venue.seats.len());
        let mut available = 0u32;
        let mut reserved = 0u32;
        let mut booked = 0u32;
        let mut available_by_section: HashMap<String, u32> = HashMap::new();

        for seat in &venue.seats {
            let (status, expires_at) = if !seat.is_active {
                (SeatAvailability::Inactive, None)
            } else {
                match self.inventory.hold(event_id, seat.id) {
                    Some(SeatHold::Confirmed { .. }) => {
                        booked += 1;
                        (SeatAvailability::Booked, None)
                    }
                    Some(SeatHold::Reserved { .. }) => {
                        reserved += 1;
                        let expires_at = self
                            .ledger
                            .active_for_seat(event_id, seat.id)
                            .map(|r| r.expires_at);
                        (SeatAvailability::Reserved, expires_at)
                    }
                    None => {
                        available += 1;
                        *available_by_section
                            .entry(seat.section_code.clone())
                            .or_insert(0) += 1;
                        (SeatAvailability::Available, None)
                    }
                }
            };
            seats.push(SeatAvailabilityInfo {
                seat_id: seat.id,
                seat_code: seat.seat_code(),
                section_code: seat.section_code.clone(),
                seat_type: seat.seat_type,
                status,
                price: round_money(event.base_price * seat.pricing_tier),
                reservation_expires_at: expires_at,
            });
        }

        Ok(AvailabilitySnapshot {
            event_id,
            total_seats: event.total_seats,
            available_seats: available,
            reserved_seats: reserved,
            booked_seats: booked,
            available_by_section,
            seats,
            taken_at: now,
        })
    }

    fn refresh_available_gauge(&self, event_id: Uuid) {
        if let Ok((_, available, _)) = self.inventory.counters(event_id) {
            self.metrics.available_seats.set(available as f64);
        }
    }
}
