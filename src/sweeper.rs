use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::service::BookingService;

/// Background task that periodically sweeps expired bookings and seat
/// holds. Expiry is also detected lazily at confirmation time, so the
/// sweeper sets the upper bound on how long a dead hold keeps a seat out
/// of the pool, not correctness.
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Spawns the sweep loop on the current runtime.
    pub fn spawn(service: BookingService, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Expiry sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = service.clock().now();
                        let transitions = service.sweep_expired(now);
                        if transitions > 0 {
                            info!(transitions, "Expiry sweep pass finished");
                        } else {
                            debug!("Expiry sweep pass found nothing to do");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Expiry sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signals the loop to stop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
