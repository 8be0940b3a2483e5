use std::sync::Arc;

use book_the_show::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

/// Service with a manual clock, one venue with three seats, and a draft
/// event three days out. Tests publish the event themselves when needed.
fn setup() -> (BookingService, Arc<ManualClock>, Uuid, Uuid, Vec<Uuid>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let clock = Arc::new(ManualClock::new(start_of_day()));
    let service = BookingService::with_clock(EngineConfig::default(), clock.clone()).unwrap();

    let venue = service
        .register_venue("Casa da Musica", "Porto", VenueType::ConcertHall)
        .unwrap();
    let mut seat_ids = Vec::new();
    for n in 1..=3u32 {
        let seat = service
            .add_seat(venue.id, "C", "2", n, SeatType::Regular, dec!(1.0))
            .unwrap();
        seat_ids.push(seat.id);
    }

    let start = start_of_day() + Duration::days(3);
    let event = service
        .create_event(
            "Spring Gala",
            venue.id,
            "",
            start,
            start + Duration::hours(2),
            dec!(30.00),
            10,
        )
        .unwrap();
    (service, clock, venue.id, event.id, seat_ids)
}

#[tokio::test]
async fn cancelled_events_stop_selling() {
    let (service, _, _, event_id, seats) = setup();
    service.publish_event(event_id).unwrap();

    service.cancel_event(event_id).unwrap();
    assert_eq!(service.event(event_id).unwrap().status, EventStatus::Cancelled);

    let err = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[..1], "x@example.com", "")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidState(_)));

    // Cancelling twice is rejected.
    assert!(matches!(
        service.cancel_event(event_id),
        Err(BookingError::InvalidState(_))
    ));
}

#[tokio::test]
async fn completing_an_event_waits_for_the_end() {
    let (service, clock, _, event_id, _) = setup();
    service.publish_event(event_id).unwrap();

    // Still three days from the end.
    assert!(matches!(
        service.complete_event(event_id),
        Err(BookingError::InvalidState(_))
    ));

    clock.advance(Duration::days(3) + Duration::hours(3));
    service.complete_event(event_id).unwrap();
    assert_eq!(service.event(event_id).unwrap().status, EventStatus::Completed);

    // Completed events cannot be cancelled after the fact.
    assert!(matches!(
        service.cancel_event(event_id),
        Err(BookingError::InvalidState(_))
    ));
}

#[tokio::test]
async fn pricing_updates_lock_once_seats_are_booked() {
    let (service, _, _, event_id, seats) = setup();

    // Draft events reprice freely.
    service.update_event_pricing(event_id, dec!(35.00)).unwrap();
    assert_eq!(service.event(event_id).unwrap().base_price, dec!(35.00));

    assert!(matches!(
        service.update_event_pricing(event_id, dec!(-1.00)),
        Err(BookingError::Validation(_))
    ));

    service.publish_event(event_id).unwrap();
    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[..1], "x@example.com", "")
        .await
        .unwrap();

    assert!(matches!(
        service.update_event_pricing(event_id, dec!(40.00)),
        Err(BookingError::InvalidState(_))
    ));
    assert_eq!(service.event(event_id).unwrap().base_price, dec!(35.00));
}

#[tokio::test]
async fn booking_window_gates_reservations() {
    let (service, clock, _, event_id, seats) = setup();

    let opens = start_of_day() + Duration::days(1);
    let closes = start_of_day() + Duration::days(2);
    service.set_booking_window(event_id, opens, closes).unwrap();
    service.publish_event(event_id).unwrap();

    // Sales have not opened yet.
    let err = service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[..1], "x@example.com", "")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidState(_)));

    clock.advance(Duration::days(1) + Duration::hours(1));
    service
        .reserve_seats(event_id, Uuid::new_v4(), &seats[..1], "x@example.com", "")
        .await
        .unwrap();

    // A window that closes before it opens is rejected outright.
    assert!(matches!(
        service.set_booking_window(event_id, closes, opens),
        Err(BookingError::Validation(_))
    ));
}

#[tokio::test]
async fn deactivated_venues_host_no_new_events() {
    let (service, _, venue_id, _, _) = setup();

    service.deactivate_venue(venue_id).unwrap();
    assert!(!service.venue(venue_id).unwrap().is_active);

    let start = start_of_day() + Duration::days(5);
    let err = service
        .create_event("Encore", venue_id, "", start, start + Duration::hours(2), dec!(30.00), 10)
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[test]
fn config_env_overrides_layer_on_defaults() {
    let defaults = EngineConfig::default();
    assert_eq!(defaults.reservation_ttl_minutes, 15);
    assert_eq!(defaults.booking_ttl_minutes, 20);
    assert_eq!(defaults.service_fee_rate, dec!(0.10));
    assert_eq!(defaults.tax_rate, dec!(0.08));

    std::env::set_var("BTS_RESERVATION_TTL_MINUTES", "5");
    std::env::set_var("BTS_CANCELLATION_WINDOW_HOURS", "48");
    let loaded = EngineConfig::load(None).unwrap();
    std::env::remove_var("BTS_RESERVATION_TTL_MINUTES");
    std::env::remove_var("BTS_CANCELLATION_WINDOW_HOURS");

    assert_eq!(loaded.reservation_ttl_minutes, 5);
    assert_eq!(loaded.reservation_ttl(), Duration::minutes(5));
    assert_eq!(loaded.cancellation_window_hours, 48);
    // Untouched keys keep their defaults.
    assert_eq!(loaded.booking_ttl_minutes, defaults.booking_ttl_minutes);
    assert_eq!(loaded.sweep_interval_seconds, defaults.sweep_interval_seconds);
}

#[test]
fn stored_totals_match_recomputation() {
    let now = start_of_day();
    let event_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let ttl = Duration::minutes(15);

    let reservations = vec![
        SeatReservation::new(Uuid::new_v4(), event_id, user_id, dec!(50.00), ttl, now).unwrap(),
        SeatReservation::new(Uuid::new_v4(), event_id, user_id, dec!(75.00), ttl, now).unwrap(),
    ];
    let booking = Booking::new(
        user_id,
        event_id,
        "x@example.com",
        "",
        reservations,
        dec!(0.10),
        dec!(0.08),
        Duration::minutes(20),
        now,
    )
    .unwrap();

    assert_eq!(
        booking.recomputed_total(dec!(0.10), dec!(0.08)),
        booking.pricing.grand_total
    );

    // A tampered seat price no longer adds up.
    let mut tampered = booking.clone();
    tampered.reservations[0].price = dec!(1.00);
    assert_ne!(
        tampered.recomputed_total(dec!(0.10), dec!(0.08)),
        tampered.pricing.grand_total
    );
}
