//! Background release of lapsed stock holds.
//!
//! The `ExpiryReaper` runs as a background task in the API server and can
//! also be triggered on demand. Both paths call the same [`ExpiryReaper::sweep`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use store::InventoryStore;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Default number of holds released per store round-trip.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default time between scheduled sweeps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub reservations_processed: usize,
    pub duration: Duration,
}

/// Releases `reserved` holds whose TTL has passed.
///
/// Never touches raw stock. Safe to run concurrently with itself and with
/// commits: the store skips rows another transaction holds and only updates
/// holds that are still `reserved`.
pub struct ExpiryReaper<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    interval: Duration,
}

impl<S> Clone for ExpiryReaper<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            batch_size: self.batch_size,
            interval: self.interval,
        }
    }
}

impl<S: InventoryStore + 'static> ExpiryReaper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Releases every hold that had lapsed when the sweep started.
    ///
    /// Works in batches until a batch comes back short.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut processed = 0;

        loop {
            let released = self.store.release_expired(now, self.batch_size).await?;
            processed += released;
            if released < self.batch_size {
                break;
            }
        }

        let duration = started.elapsed();
        metrics::counter!("reaper_reservations_released_total").increment(processed as u64);
        metrics::histogram!("reaper_sweep_duration_seconds").record(duration.as_secs_f64());

        Ok(SweepReport {
            reservations_processed: processed,
            duration,
        })
    }

    /// Spawns the scheduled sweep loop. The task ends when `shutdown` resolves.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Expiry reaper stopped");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                match self.sweep().await {
                    Ok(report) if report.reservations_processed > 0 => {
                        tracing::info!(
                            released = report.reservations_processed,
                            duration_ms = report.duration.as_millis() as u64,
                            "Expiry reaper released lapsed holds"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        metrics::counter!("reaper_failures_total").increment(1);
                        tracing::warn!(error = %e, "Expiry reaper sweep failed");
                    }
                }
            }
        })
    }
}
