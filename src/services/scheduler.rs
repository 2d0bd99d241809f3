//! Periodic reconciliation.
//!
//! The `SweepScheduler` runs the two-pass sweep in the server process so that
//! drift left behind by failed immediate writes and lost webhooks is repaired
//! without an operator.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::reconciliation::{ReconciliationService, Result, SweepReport};

/// Background task that sweeps on a fixed interval.
pub struct SweepScheduler {
    service: Arc<ReconciliationService>,
    interval: Duration,
}

impl SweepScheduler {
    pub fn new(service: Arc<ReconciliationService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Spawn the scheduler as a background task.
    ///
    /// The first sweep runs immediately. A sweep that overruns the interval
    /// delays the next one instead of queueing extra runs.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.service.sweep().await {
                    Ok(report) if report.total_updated() > 0 || report.total_errors() > 0 => {
                        info!(
                            updated = report.total_updated(),
                            errors = report.total_errors(),
                            "Scheduled sweep repaired drift"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Scheduled sweep failed");
                    }
                }
            }
        })
    }

    /// Run one sweep now.
    pub async fn run_once(&self) -> Result<SweepReport> {
        self.service.sweep().await
    }
}
