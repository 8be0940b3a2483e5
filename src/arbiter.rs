use crate::clock::{Clock, SharedClock};
use crate::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

/// Proof of exclusive holds on a set of seats. Dropping the grant does not
/// release anything; callers release explicitly (or let the lease lapse).
#[derive(Debug, Clone)]
pub struct SeatLockGrant {
    pub token: Uuid,
    pub event_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub holder_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Read-only view of one seat's lock state, for availability displays.
#[derive(Debug, Clone)]
pub struct SeatLockInfo {
    pub seat_id: Uuid,
    pub is_locked: bool,
    pub locked_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Mutual exclusion for seat reservation: at most one holder per seat per
/// event at any instant, across all concurrent callers.
///
/// Acquisition is all-or-nothing. A partial grab never happens; when any
/// requested seat is contested the caller gets the losing seat ids back and
/// nothing is held. Implementations are lease-based so a crashed holder
/// cannot wedge a seat forever; a distributed backend only has to implement
/// this trait.
#[async_trait]
pub trait SeatLockService: Send + Sync {
    /// Waits up to `timeout` for every requested seat, then either grants
    /// all of them or fails with the conflicting seat ids.
    async fn acquire(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        holder_id: Uuid,
        timeout: Duration,
    ) -> Result<SeatLockGrant>;

    /// Releases the grant's seats. Seats whose lease was already reclaimed
    /// by someone else are left alone.
    async fn release(&self, grant: &SeatLockGrant) -> Result<()>;

    /// Pushes the grant's lease further out.
    async fn extend(&self, token: Uuid, additional: chrono::Duration) -> Result<DateTime<Utc>>;

    /// Lock state per seat. Leases held by `exclude_holder` are reported as
    /// free (a user browsing seats they themselves are holding).
    async fn status(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        exclude_holder: Option<Uuid>,
    ) -> Vec<SeatLockInfo>;
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    token: Uuid,
    holder_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-process lease lock.
///
/// A per-event async mutex serializes acquisition attempts, which gives the
/// all-or-nothing guarantee and a total order of grants per event. Expired
/// leases are reclaimed lazily at the next acquisition that wants the seat.
pub struct InMemorySeatLock {
    locks: DashMap<(Uuid, Uuid), LockEntry>,
    event_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    clock: SharedClock,
    lease: chrono::Duration,
}

impl InMemorySeatLock {
    pub fn new(clock: SharedClock, lease: chrono::Duration) -> Self {
        Self {
            locks: DashMap::new(),
            event_gates: DashMap::new(),
            clock,
            lease,
        }
    }

    fn event_gate(&self, event_id: Uuid) -> Arc<Mutex<()>> {
        self.event_gates
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Single acquisition attempt under the event gate. Returns conflicting
    /// seat ids on failure.
    async fn try_acquire_once(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        holder_id: Uuid,
    ) -> std::result::Result<SeatLockGrant, Vec<Uuid>> {
        let gate = self.event_gate(event_id);
        let _serialized = gate.lock().await;

        let now = self.clock.now();
        let conflicting: Vec<Uuid> = seat_ids
            .iter()
            .copied()
            .filter(|seat_id| {
                self.locks
                    .get(&(event_id, *seat_id))
                    .map(|entry| entry.expires_at > now && entry.holder_id != holder_id)
                    .unwrap_or(false)
            })
            .collect();

        if !conflicting.is_empty() {
            return Err(conflicting);
        }

        let token = Uuid::new_v4();
        let expires_at = now + self.lease;
        for seat_id in seat_ids {
            self.locks.insert(
                (event_id, *seat_id),
                LockEntry {
                    token,
                    holder_id,
                    expires_at,
                },
            );
        }

        Ok(SeatLockGrant {
            token,
            event_id,
            seat_ids: seat_ids.to_vec(),
            holder_id,
            expires_at,
        })
    }
}

#[async_trait]
impl SeatLockService for InMemorySeatLock {
    async fn acquire(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        holder_id: Uuid,
        timeout: Duration,
    ) -> Result<SeatLockGrant> {
        if seat_ids.is_empty() {
            return Err(BookingError::Validation(
                "At least one seat must be requested".to_string(),
            ));
        }

        let started = Instant::now();
        let mut backoff = Duration::from_millis(10);

        loop {
            match self.try_acquire_once(event_id, seat_ids, holder_id).await {
                Ok(grant) => {
                    debug!(
                        event_id = %event_id,
                        holder_id = %holder_id,
                        token = %grant.token,
                        seats = seat_ids.len(),
                        "Seat locks acquired"
                    );
                    return Ok(grant);
                }
                Err(conflicting) => {
                    if started.elapsed() >= timeout {
                        debug!(
                            event_id = %event_id,
                            holder_id = %holder_id,
                            conflicts = conflicting.len(),
                            "Seat lock acquisition timed out"
                        );
                        return Err(BookingError::Availability {
                            conflicting_seats: conflicting,
                        });
                    }
                    trace!(
                        event_id = %event_id,
                        holder_id = %holder_id,
                        "Seats contested, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(200));
                }
            }
        }
    }

    async fn release(&self, grant: &SeatLockGrant) -> Result<()> {
        for seat_id in &grant.seat_ids {
            self.locks
                .remove_if(&(grant.event_id, *seat_id), |_, entry| {
                    entry.token == grant.token
                });
        }
        Ok(())
    }

    async fn extend(&self, token: Uuid, additional: chrono::Duration) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        let mut new_expiry = None;
        for mut entry in self.locks.iter_mut() {
            if entry.token == token && entry.expires_at > now {
                entry.expires_at = entry.expires_at + additional;
                new_expiry = Some(entry.expires_at);
            }
        }
        new_expiry.ok_or_else(|| {
            BookingError::NotFound(format!("No active lease for token {}", token))
        })
    }

    async fn status(
        &self,
        event_id: Uuid,
        seat_ids: &[Uuid],
        exclude_holder: Option<Uuid>,
    ) -> Vec<SeatLockInfo> {
        let now = self.clock.now();
        seat_ids
            .iter()
            .map(|seat_id| {
                let entry = self
                    .locks
                    .get(&(event_id, *seat_id))
                    .map(|e| *e.value())
                    .filter(|e| e.expires_at > now)
                    .filter(|e| exclude_holder != Some(e.holder_id));
                match entry {
                    Some(e) => SeatLockInfo {
                        seat_id: *seat_id,
                        is_locked: true,
                        locked_by: Some(e.holder_id),
                        expires_at: Some(e.expires_at),
                    },
                    None => SeatLockInfo {
                        seat_id: *seat_id,
                        is_locked: false,
                        locked_by: None,
                        expires_at: None,
                    },
                }
            })
            .collect()
    }
}
