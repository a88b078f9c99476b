//! Periodic sync runs on a single background task.

use super::{DatabaseStore, SheetStore, SyncError, SyncService};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Run a sync every `every`, starting immediately.
///
/// A failed run is logged and retried on the next tick. A tick that finds
/// a run already in progress (started over HTTP) is skipped.
pub fn spawn_scheduler<D, S>(service: Arc<SyncService<D, S>>, every: Duration) -> JoinHandle<()>
where
    D: DatabaseStore + 'static,
    S: SheetStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Scheduled sync every {}s", every.as_secs());

        loop {
            ticker.tick().await;
            match service.run().await {
                Ok(summary) => tracing::info!(
                    writes = summary.writes(),
                    "Scheduled sync finished"
                ),
                Err(SyncError::InProgress) => {
                    tracing::debug!("Scheduled sync skipped, a run is in progress")
                }
                Err(e) => tracing::error!("Scheduled sync failed: {}", e),
            }
        }
    })
}
