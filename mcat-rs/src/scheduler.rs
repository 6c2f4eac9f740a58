//! Periodic regional sync trigger
//!
//! Fires on a fixed cadence (first tick immediately at startup). Errors are
//! logged by the service and never escape this loop; the next tick is the
//! retry.

use crate::sync::{RegionalSyncService, SyncOutcome, SyncTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn the scheduler task; it exits when `shutdown` is cancelled
pub fn spawn_regional_sync(
    service: Arc<RegionalSyncService>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = period.as_secs(),
            source = %service.source_description(),
            "Regional sync scheduler started"
        );

        let mut tick = interval(period);
        // A slow run must not be followed by a burst of catch-up runs
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = service.run(SyncTrigger::Scheduled) => {
                    if let Ok(SyncOutcome::Skipped) = result {
                        debug!("Scheduled regional sync skipped; previous run still in flight");
                    }
                }
            }
        }

        info!("Regional sync scheduler stopped");
    })
}
