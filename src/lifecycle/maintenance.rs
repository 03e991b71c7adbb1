//! Periodic housekeeping jobs.
//!
//! Used to sweep expired cache entries and idle rate limit buckets on a
//! fixed interval until shutdown.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

/// A named job returning how many items it removed.
pub struct MaintenanceTask {
    name: &'static str,
    interval: Duration,
    job: Box<dyn Fn() -> usize + Send + Sync>,
}

impl MaintenanceTask {
    pub fn new<F>(name: &'static str, interval: Duration, job: F) -> Self
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        Self {
            name,
            interval,
            job: Box::new(job),
        }
    }

    /// Run until the shutdown signal fires. A zero interval disables the job.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.interval.is_zero() {
            tracing::info!(task = self.name, "Maintenance task disabled");
            return;
        }

        tracing::info!(task = self.name, interval = ?self.interval, "Maintenance task starting");
        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = (self.job)();
                    tracing::debug!(task = self.name, removed, "Maintenance pass complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!(task = self.name, "Maintenance task received shutdown signal");
                    break;
                }
            }
        }
    }
}
