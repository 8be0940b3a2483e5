use std::sync::Arc;

use book_the_show::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

fn setup(seat_count: usize) -> (BookingService, Arc<ManualClock>, Uuid, Vec<Uuid>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let clock = Arc::new(ManualClock::new(start_of_day()));
    let mut config = EngineConfig::default();
    // Losers should fail fast instead of polling for the full 15s.
    config.lock_acquire_timeout_ms = 250;
    let service = BookingService::with_clock(config, clock.clone()).unwrap();

    let venue = service
        .register_venue("Arena Norte", "Braga", VenueType::Arena)
        .unwrap();
    let mut seat_ids = Vec::new();
    for n in 1..=seat_count {
        let seat = service
            .add_seat(venue.id, "F", "2", n as u32, SeatType::Regular, dec!(1.0))
            .unwrap();
        seat_ids.push(seat.id);
    }

    let start = start_of_day() + Duration::days(3);
    let event = service
        .create_event(
            "Derby Night",
            venue.id,
            "",
            start,
            start + Duration::hours(2),
            dec!(35.00),
            10,
        )
        .unwrap();
    service.publish_event(event.id).unwrap();
    (service, clock, event.id, seat_ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_seat_many_buyers_exactly_one_wins() {
    let (service, _, event_id, seats) = setup(1);
    let seat = seats[0];

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .reserve_seats(
                    event_id,
                    Uuid::new_v4(),
                    &[seat],
                    &format!("buyer{}@example.com", i),
                    "",
                )
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(BookingError::Availability { conflicting_seats }) => {
                assert_eq!(conflicting_seats, vec![seat]);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);

    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 0);
    assert_eq!(event.booked_seats, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_seat_sets_never_split() {
    // {s0, s1} vs {s1, s2}: whoever loses s1 must hold nothing at all.
    let (service, _, event_id, seats) = setup(3);

    let first = {
        let service = service.clone();
        let want = vec![seats[0], seats[1]];
        tokio::spawn(async move {
            service
                .reserve_seats(event_id, Uuid::new_v4(), &want, "a@example.com", "")
                .await
        })
    };
    let second = {
        let service = service.clone();
        let want = vec![seats[1], seats[2]];
        tokio::spawn(async move {
            service
                .reserve_seats(event_id, Uuid::new_v4(), &want, "b@example.com", "")
                .await
        })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();

    match winners {
        // One side took s1; the other got nothing, so exactly two seats
        // are held.
        1 => {
            let event = service.event(event_id).unwrap();
            assert_eq!(event.booked_seats, 2);
            assert_eq!(event.available_seats, 1);
            let loser = results.iter().find(|r| r.is_err()).unwrap();
            match loser {
                Err(BookingError::Availability { conflicting_seats }) => {
                    assert_eq!(conflicting_seats, &vec![seats[1]]);
                }
                other => panic!("expected availability conflict, got {other:?}"),
            }
        }
        // Interleaving where the loser's failed attempt freed s1 in time
        // cannot happen: the winner's hold persists until cancel/expiry.
        2 => panic!("both overlapping requests succeeded"),
        _ => panic!("no request succeeded"),
    }
}

#[tokio::test]
async fn partial_failure_rolls_back_every_hold() {
    let (service, _, event_id, seats) = setup(3);
    let first_user = Uuid::new_v4();

    service
        .reserve_seats(event_id, first_user, &[seats[1]], "a@example.com", "")
        .await
        .unwrap();

    // s1 is taken, so asking for {s0, s1, s2} fails and must leave s0 and
    // s2 untouched.
    let err = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "b@example.com", "")
        .await
        .unwrap_err();
    assert_eq!(err.conflicting_seats(), &[seats[1]][..]);

    let event = service.event(event_id).unwrap();
    assert_eq!(event.booked_seats, 1);
    assert_eq!(event.available_seats, 2);
    assert!(service.inventory().hold(event_id, seats[0]).is_none());
    assert!(service.inventory().hold(event_id, seats[2]).is_none());
}

#[tokio::test]
async fn stale_lease_is_reclaimed_by_the_next_holder() {
    let clock = Arc::new(ManualClock::new(start_of_day()));
    let arbiter = InMemorySeatLock::new(clock.clone(), Duration::seconds(30));
    let event_id = Uuid::new_v4();
    let seat = Uuid::new_v4();
    let timeout = std::time::Duration::from_millis(100);

    let first = arbiter
        .acquire(event_id, &[seat], Uuid::new_v4(), timeout)
        .await
        .unwrap();

    // Still leased: a different holder cannot take it.
    let err = arbiter
        .acquire(event_id, &[seat], Uuid::new_v4(), timeout)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Availability { .. }));

    // Past the lease, the seat is fair game again without a release.
    clock.advance(Duration::seconds(31));
    let second = arbiter
        .acquire(event_id, &[seat], Uuid::new_v4(), timeout)
        .await
        .unwrap();
    assert_ne!(second.token, first.token);
}

#[tokio::test]
async fn extending_a_lease_keeps_it_held() {
    let clock = Arc::new(ManualClock::new(start_of_day()));
    let arbiter = InMemorySeatLock::new(clock.clone(), Duration::seconds(30));
    let event_id = Uuid::new_v4();
    let seat = Uuid::new_v4();
    let timeout = std::time::Duration::from_millis(100);

    let grant = arbiter
        .acquire(event_id, &[seat], Uuid::new_v4(), timeout)
        .await
        .unwrap();
    let extended_to = arbiter
        .extend(grant.token, Duration::seconds(60))
        .await
        .unwrap();
    assert_eq!(extended_to, grant.expires_at + Duration::seconds(60));

    clock.advance(Duration::seconds(45));
    let err = arbiter
        .acquire(event_id, &[seat], Uuid::new_v4(), timeout)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Availability { .. }));
}

#[tokio::test]
async fn lock_status_hides_the_callers_own_leases() {
    let clock = Arc::new(ManualClock::new(start_of_day()));
    let arbiter = InMemorySeatLock::new(clock, Duration::seconds(30));
    let event_id = Uuid::new_v4();
    let seats = [Uuid::new_v4(), Uuid::new_v4()];
    let holder = Uuid::new_v4();

    arbiter
        .acquire(event_id, &seats[..1], holder, std::time::Duration::from_millis(100))
        .await
        .unwrap();

    let status = arbiter.status(event_id, &seats, None).await;
    assert!(status.iter().find(|s| s.seat_id == seats[0]).unwrap().is_locked);
    assert!(!status.iter().find(|s| s.seat_id == seats[1]).unwrap().is_locked);

    let own_view = arbiter.status(event_id, &seats, Some(holder)).await;
    assert!(own_view.iter().all(|s| !s.is_locked));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversell_is_impossible_under_load() {
    let (service, _, event_id, seats) = setup(4);

    // 12 buyers chase 4 seats, one or two at a time.
    let mut handles = Vec::new();
    for i in 0..12 {
        let service = service.clone();
        let want: Vec<Uuid> = if i % 3 == 0 {
            vec![seats[i % 4], seats[(i + 1) % 4]]
        } else {
            vec![seats[i % 4]]
        };
        handles.push(tokio::spawn(async move {
            service
                .reserve_seats(event_id, Uuid::new_v4(), &want, "load@example.com", "")
                .await
        }));
    }

    let mut seats_sold = 0usize;
    for handle in handles {
        if let Ok(initiation) = handle.await.unwrap() {
            seats_sold += initiation.reservation_ids.len();
        }
    }

    let event = service.event(event_id).unwrap();
    assert_eq!(event.booked_seats as usize, seats_sold);
    assert!(event.booked_seats <= 4);
    assert_eq!(event.available_seats + event.booked_seats, event.total_seats);

    // Every hold belongs to exactly one reservation.
    let snapshot = service.availability(event_id).unwrap();
    assert_eq!(snapshot.reserved_seats as usize, seats_sold);
}
