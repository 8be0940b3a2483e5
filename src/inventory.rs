use crate::domain::{Event, EventStatus};
use crate::store::StateStore;
use crate::{BookingError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Active hold on one seat for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatHold {
    Reserved { user_id: Uuid },
    Confirmed { user_id: Uuid },
}

impl SeatHold {
    pub fn user_id(&self) -> Uuid {
        match self {
            SeatHold::Reserved { user_id } | SeatHold::Confirmed { user_id } => *user_id,
        }
    }
}

/// Source of truth for seat availability.
///
/// Holds the per-event counters (inside each [`Event`] record) and the
/// per-(event, seat) hold index. Counter updates run under the event
/// entry's lock, so two overlapping reservation attempts on the same event
/// observe a total order. Lock order is always event entry first, then the
/// hold index; no path takes them the other way around.
pub struct SeatInventory {
    events: StateStore<Uuid, Event>,
    holds: Arc<DashMap<(Uuid, Uuid), SeatHold>>,
}

impl Clone for SeatInventory {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            holds: Arc::clone(&self.holds),
        }
    }
}

impl SeatInventory {
    pub fn new() -> Self {
        Self {
            events: StateStore::new(),
            holds: Arc::new(DashMap::new()),
        }
    }

    pub fn insert_event(&self, event: Event) {
        self.events.put(event.id, event);
    }

    pub fn event(&self, event_id: Uuid) -> Result<Event> {
        self.events
            .get(&event_id)
            .ok_or_else(|| BookingError::NotFound(format!("Event {} not found", event_id)))
    }

    /// Runs a mutation against the event record under its entry lock.
    pub fn with_event_mut<R>(
        &self,
        event_id: Uuid,
        f: impl FnOnce(&mut Event) -> Result<R>,
    ) -> Result<R> {
        self.events
            .with_entry_mut(&event_id, f)
            .ok_or_else(|| BookingError::NotFound(format!("Event {} not found", event_id)))?
    }

    /// Atomically claims every requested seat or none of them.
    ///
    /// Rejects non-live events, closed booking windows, empty or oversized
    /// seat sets, duplicate ids, and any seat already held for this event.
    /// On success the event counters move by `seat_ids.len()` in the same
    /// critical section that records the holds.
    pub fn try_reserve(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if seat_ids.is_empty() {
            return Err(BookingError::Validation(
                "At least one seat must be selected".to_string(),
            ));
        }
        let unique: HashSet<Uuid> = seat_ids.iter().copied().collect();
        if unique.len() != seat_ids.len() {
            return Err(BookingError::Validation(
                "Duplicate seat ids in reservation request".to_string(),
            ));
        }

        self.with_event_mut(event_id, |event| {
            if event.status != EventStatus::Live {
                return Err(BookingError::InvalidState(format!(
                    "Event {} is not live for booking",
                    event_id
                )));
            }
            if !event.is_booking_open(now) {
                return Err(BookingError::InvalidState(
                    "Booking is not currently open for this event".to_string(),
                ));
            }
            if seat_ids.len() as u32 > event.max_seats_per_booking {
                return Err(BookingError::Validation(format!(
                    "Cannot book more than {} seats per booking",
                    event.max_seats_per_booking
                )));
            }

            let conflicting: Vec<Uuid> = seat_ids
                .iter()
                .copied()
                .filter(|seat_id| self.holds.contains_key(&(event_id, *seat_id)))
                .collect();
            if !conflicting.is_empty() {
                debug!(
                    event_id = %event_id,
                    conflicts = conflicting.len(),
                    "Seat reservation rejected, seats already held"
                );
                return Err(BookingError::Availability {
                    conflicting_seats: conflicting,
                });
            }

            event.reserve_seats(seat_ids.len() as u32, now)?;
            for seat_id in seat_ids {
                self.holds
                    .insert((event_id, *seat_id), SeatHold::Reserved { user_id });
            }
            Ok(())
        })
    }

    /// Releases Reserved holds owned by `user_id` and gives the seats back
    /// to the pool. Seats without a matching hold are skipped, so sweeper
    /// retries, repeated releases, and releases racing a resale are all
    /// harmless. Returns how many seats were actually released.
    pub fn release(&self, event_id: Uuid, seat_ids: &[Uuid], user_id: Uuid) -> Result<usize> {
        self.with_event_mut(event_id, |event| {
            let mut released = 0u32;
            for seat_id in seat_ids {
                let key = (event_id, *seat_id);
                let owned = matches!(
                    self.holds.get(&key).map(|h| *h.value()),
                    Some(SeatHold::Reserved { user_id: holder }) if holder == user_id
                );
                if owned {
                    self.holds.remove(&key);
                    released += 1;
                }
            }
            event.release_seats(released)?;
            Ok(released as usize)
        })
    }

    /// Flips a Reserved hold to Confirmed. Counters stay put: the seat is
    /// still booked, just permanently now.
    pub fn confirm_hold(&self, event_id: Uuid, seat_id: Uuid) -> Result<()> {
        let mut entry = self.holds.get_mut(&(event_id, seat_id)).ok_or_else(|| {
            BookingError::InvalidState(format!(
                "No active hold for seat {} on event {}",
                seat_id, event_id
            ))
        })?;
        let user_id = entry.user_id();
        *entry = SeatHold::Confirmed { user_id };
        Ok(())
    }

    /// Puts a confirmed hold back to reserved. Compensation for a
    /// multi-seat confirmation that failed partway through.
    pub fn revert_hold(&self, event_id: Uuid, seat_id: Uuid) {
        if let Some(mut entry) = self.holds.get_mut(&(event_id, seat_id)) {
            if let SeatHold::Confirmed { user_id } = *entry {
                *entry = SeatHold::Reserved { user_id };
            }
        }
    }

    /// Refund path only: removes a Confirmed hold and returns the seat to
    /// the pool.
    pub fn release_confirmed(&self, event_id: Uuid, seat_id: Uuid) -> Result<()> {
        self.with_event_mut(event_id, |event| {
            let key = (event_id, seat_id);
            match self.holds.get(&key).map(|h| *h.value()) {
                Some(SeatHold::Confirmed { .. }) => {
                    self.holds.remove(&key);
                    event.release_seats(1)
                }
                Some(SeatHold::Reserved { .. }) => Err(BookingError::InvalidState(
                    "Seat hold is not confirmed; use release instead".to_string(),
                )),
                None => {
                    warn!(event_id = %event_id, seat_id = %seat_id, "No confirmed hold to release");
                    Ok(())
                }
            }
        })
    }

    pub fn hold(&self, event_id: Uuid, seat_id: Uuid) -> Option<SeatHold> {
        self.holds.get(&(event_id, seat_id)).map(|h| *h.value())
    }

    /// (total, available, booked) for the event.
    pub fn counters(&self, event_id: Uuid) -> Result<(u32, u32, u32)> {
        let event = self.event(event_id)?;
        Ok((event.total_seats, event.available_seats, event.booked_seats))
    }
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new()
    }
}
