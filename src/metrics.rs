use crate::Result;
use prometheus::{
    register_counter_with_registry, register_gauge_with_registry,
    register_histogram_with_registry, Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Business metrics for the booking engine.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Reservation metrics
    pub reservation_attempts: Counter,
    pub reservation_conflicts: Counter,
    pub seats_reserved: Counter,
    pub seats_released: Counter,

    // Booking metrics
    pub bookings_created: Counter,
    pub bookings_confirmed: Counter,
    pub bookings_cancelled: Counter,
    pub bookings_expired: Counter,

    // Sweeper metrics
    pub sweep_passes: Counter,
    pub sweep_transitions: Counter,
    pub sweep_duration: Histogram,

    // Lock metrics
    pub lock_wait_duration: Histogram,

    pub available_seats: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reservation_attempts = register_counter_with_registry!(
            Opts::new(
                "reservation_attempts_total",
                "Total number of seat reservation attempts"
            ),
            registry
        )?;

        let reservation_conflicts = register_counter_with_registry!(
            Opts::new(
                "reservation_conflicts_total",
                "Reservation attempts rejected because seats were held"
            ),
            registry
        )?;

        let seats_reserved = register_counter_with_registry!(
            Opts::new("seats_reserved_total", "Total number of seats reserved"),
            registry
        )?;

        let seats_released = register_counter_with_registry!(
            Opts::new(
                "seats_released_total",
                "Seats returned to the pool by release, cancel or expiry"
            ),
            registry
        )?;

        let bookings_created = register_counter_with_registry!(
            Opts::new("bookings_created_total", "Total number of bookings created"),
            registry
        )?;

        let bookings_confirmed = register_counter_with_registry!(
            Opts::new(
                "bookings_confirmed_total",
                "Bookings confirmed after payment"
            ),
            registry
        )?;

        let bookings_cancelled = register_counter_with_registry!(
            Opts::new("bookings_cancelled_total", "Bookings cancelled"),
            registry
        )?;

        let bookings_expired = register_counter_with_registry!(
            Opts::new("bookings_expired_total", "Bookings expired unpaid"),
            registry
        )?;

        let sweep_passes = register_counter_with_registry!(
            Opts::new("sweep_passes_total", "Expiry sweeper passes completed"),
            registry
        )?;

        let sweep_transitions = register_counter_with_registry!(
            Opts::new(
                "sweep_transitions_total",
                "Entities transitioned to a terminal state by the sweeper"
            ),
            registry
        )?;

        let sweep_duration = register_histogram_with_registry!(
            HistogramOpts::new("sweep_duration_seconds", "Time spent per sweeper pass")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            registry
        )?;

        let lock_wait_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "lock_wait_duration_seconds",
                "Time spent waiting for contested seat locks"
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
            registry
        )?;

        let available_seats = register_gauge_with_registry!(
            Opts::new(
                "available_seats",
                "Available seats for the most recently touched event"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            reservation_attempts,
            reservation_conflicts,
            seats_reserved,
            seats_released,
            bookings_created,
            bookings_confirmed,
            bookings_cancelled,
            bookings_expired,
            sweep_passes,
            sweep_transitions,
            sweep_duration,
            lock_wait_duration,
            available_seats,
        })
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn record_reservation_attempt(&self, success: bool, seat_count: usize) {
        self.reservation_attempts.inc();
        if success {
            self.seats_reserved.inc_by(seat_count as f64);
        } else {
            self.reservation_conflicts.inc();
        }
    }

    pub fn record_sweep(&self, transitions: usize, duration: std::time::Duration) {
        self.sweep_passes.inc();
        self.sweep_transitions.inc_by(transitions as f64);
        self.sweep_duration.observe(duration.as_secs_f64());
    }
}
