use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine-wide tunables. Every deadline and rate the booking lifecycle uses
/// comes from here so deployments can tighten or relax them without code
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minutes a seat hold survives before it auto-expires.
    pub reservation_ttl_minutes: i64,
    /// Minutes a booking may sit unpaid before it auto-expires.
    pub booking_ttl_minutes: i64,
    /// Service fee charged on the base amount.
    pub service_fee_rate: Decimal,
    /// Tax charged on base plus service fee.
    pub tax_rate: Decimal,
    /// Seconds a contention lease lives before other holders may reclaim it.
    pub lock_lease_seconds: i64,
    /// Milliseconds a reservation request waits for contested seats.
    pub lock_acquire_timeout_ms: u64,
    /// Seconds between expiry sweeper passes.
    pub sweep_interval_seconds: u64,
    /// Hours before event start after which a confirmed booking can no
    /// longer be cancelled.
    pub cancellation_window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_minutes: 15,
            booking_ttl_minutes: 20,
            service_fee_rate: Decimal::new(10, 2), // 0.10
            tax_rate: Decimal::new(8, 2),          // 0.08
            lock_lease_seconds: 30,
            lock_acquire_timeout_ms: 15_000,
            sweep_interval_seconds: 30,
            cancellation_window_hours: 24,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from an optional file, then `BTS_`-prefixed
    /// environment variables, on top of the defaults above.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("reservation_ttl_minutes", defaults.reservation_ttl_minutes)?
            .set_default("booking_ttl_minutes", defaults.booking_ttl_minutes)?
            .set_default("service_fee_rate", defaults.service_fee_rate.to_string())?
            .set_default("tax_rate", defaults.tax_rate.to_string())?
            .set_default("lock_lease_seconds", defaults.lock_lease_seconds)?
            .set_default("lock_acquire_timeout_ms", defaults.lock_acquire_timeout_ms)?
            .set_default("sweep_interval_seconds", defaults.sweep_interval_seconds)?
            .set_default("cancellation_window_hours", defaults.cancellation_window_hours)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("BTS"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reservation_ttl_minutes)
    }

    pub fn booking_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.booking_ttl_minutes)
    }

    pub fn lock_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_lease_seconds)
    }

    pub fn lock_acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_acquire_timeout_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn cancellation_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cancellation_window_hours)
    }
}
