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
    let service = BookingService::with_clock(EngineConfig::default(), clock.clone()).unwrap();

    let venue = service
        .register_venue("Opera House", "Coimbra", VenueType::ConcertHall)
        .unwrap();
    let mut seat_ids = Vec::new();
    for n in 1..=seat_count {
        let seat = service
            .add_seat(venue.id, "B", "3", n as u32, SeatType::Balcony, dec!(1.0))
            .unwrap();
        seat_ids.push(seat.id);
    }

    let start = start_of_day() + Duration::days(3);
    let event = service
        .create_event(
            "Winter Recital",
            venue.id,
            "",
            start,
            start + Duration::hours(2),
            dec!(45.00),
            10,
        )
        .unwrap();
    service.publish_event(event.id).unwrap();
    (service, clock, event.id, seat_ids)
}

#[tokio::test]
async fn sweep_returns_expired_seats_to_the_pool() {
    let (service, clock, event_id, seats) = setup(2);

    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();
    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 0);

    // Default reservation TTL is 15 minutes.
    clock.advance(Duration::minutes(16));
    let transitions = service.sweep_expired(clock.now());
    assert_eq!(transitions, 2);

    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 2);
    assert_eq!(event.booked_seats, 0);

    // Seats are sellable again.
    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "y@example.com", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn confirming_after_the_hold_lapsed_fails_expired() {
    let (service, clock, event_id, seats) = setup(1);

    let initiation = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();

    // 16 minutes in: the seat hold is dead even though the booking's own
    // 20-minute deadline has not passed, and no sweeper has run.
    clock.advance(Duration::minutes(16));
    let err = service
        .confirm_booking(initiation.booking_id, PaymentMethod::CreditCard, "txn-1")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Expired(_)));

    let booking = service.booking(initiation.booking_id).unwrap();
    assert_ne!(booking.status, BookingStatus::Confirmed);

    // The failed confirmation already expired the hold and returned the
    // seat, so the sweeper finds nothing and the seat sells again.
    for reservation_id in &initiation.reservation_ids {
        let row = service.ledger().get(*reservation_id).unwrap();
        assert_eq!(row.status, SeatReservationStatus::Expired);
    }
    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 1);
    assert_eq!(service.sweep_expired(clock.now()), 0);

    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "y@example.com", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn confirming_a_dead_booking_expires_it_in_place() {
    let (service, clock, event_id, seats) = setup(1);

    let initiation = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();

    // Past the 20-minute booking deadline.
    clock.advance(Duration::minutes(21));
    let err = service
        .confirm_booking(initiation.booking_id, PaymentMethod::CreditCard, "txn-1")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Expired(_)));

    // The lazy path already did the sweeper's work.
    let booking = service.booking(initiation.booking_id).unwrap();
    assert_eq!(booking.status, BookingStatus::Expired);
    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 1);

    let transitions = service.sweep_expired(clock.now());
    assert_eq!(transitions, 0);
}

#[tokio::test]
async fn sweeping_twice_transitions_nothing_new() {
    let (service, clock, event_id, seats) = setup(3);

    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[..2], "x@example.com", "")
        .await
        .unwrap();
    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[2..], "y@example.com", "")
        .await
        .unwrap();

    clock.advance(Duration::minutes(25));
    let first_pass = service.sweep_expired(clock.now());
    assert!(first_pass > 0);
    let second_pass = service.sweep_expired(clock.now());
    assert_eq!(second_pass, 0);

    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 3);
}

#[tokio::test]
async fn confirmed_bookings_never_expire() {
    let (service, clock, event_id, seats) = setup(1);

    let initiation = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();
    service
        .confirm_booking(initiation.booking_id, PaymentMethod::BankTransfer, "txn-1")
        .await
        .unwrap();

    clock.advance(Duration::hours(2));
    let transitions = service.sweep_expired(clock.now());
    assert_eq!(transitions, 0);

    let booking = service.booking(initiation.booking_id).unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    let event = service.event(event_id).unwrap();
    assert_eq!(event.booked_seats, 1);
}

#[tokio::test]
async fn extension_outlives_the_original_deadline() {
    let (service, clock, event_id, seats) = setup(1);

    let initiation = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();

    clock.advance(Duration::minutes(10));
    service
        .extend_booking(initiation.booking_id, Duration::minutes(15))
        .unwrap();

    // 16 minutes after creation, the extended hold is still alive.
    clock.advance(Duration::minutes(6));
    assert_eq!(service.sweep_expired(clock.now()), 0);
    let confirmation = service
        .confirm_booking(initiation.booking_id, PaymentMethod::CreditCard, "txn-1")
        .await
        .unwrap();
    assert_eq!(confirmation.ticket_codes.len(), 1);
}

#[tokio::test]
async fn expired_bookings_cannot_be_extended() {
    let (service, clock, event_id, seats) = setup(1);

    let initiation = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();

    clock.advance(Duration::minutes(21));
    let err = service
        .extend_booking(initiation.booking_id, Duration::minutes(15))
        .unwrap_err();
    assert!(matches!(err, BookingError::Expired(_)));
}

#[tokio::test]
async fn background_sweeper_runs_and_shuts_down() {
    let (service, clock, event_id, seats) = setup(1);

    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();
    clock.advance(Duration::minutes(16));

    let sweeper = ExpirySweeper::spawn(service.clone(), std::time::Duration::from_millis(20));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    sweeper.shutdown().await;

    let event = service.event(event_id).unwrap();
    assert_eq!(event.available_seats, 1);
}

#[tokio::test]
async fn sweep_metrics_count_passes_and_transitions() {
    let (service, clock, event_id, seats) = setup(1);

    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats, "x@example.com", "")
        .await
        .unwrap();
    clock.advance(Duration::minutes(16));
    service.sweep_expired(clock.now());
    service.sweep_expired(clock.now());

    let exported = service.metrics().export().unwrap();
    assert!(exported.contains("sweep_passes_total 2"));
    assert!(exported.contains("sweep_transitions_total 1"));
}
