//! Sync runs between the database and the spreadsheet.

mod error;
#[cfg(test)]
mod memory;
mod pipeline;
mod scheduler;
mod store;

pub use error::{Store, SyncError};
pub use pipeline::Pipeline;
pub use scheduler::spawn_scheduler;
pub use store::{DatabaseStore, DatabaseTable, SheetStore};

use chrono::{SubsecRound, Utc};
use sheetsync_engine::SyncSummary;
use tokio::sync::Mutex;

/// Runs syncs one at a time against a fixed pair of stores.
///
/// Only guards this process. Several processes sharing the same database
/// and spreadsheet must be serialized outside the server.
pub struct SyncService<D, S> {
    database: D,
    sheet: S,
    running: Mutex<()>,
}

impl<D: DatabaseStore, S: SheetStore> SyncService<D, S> {
    pub fn new(database: D, sheet: S) -> Self {
        Self {
            database,
            sheet,
            running: Mutex::new(()),
        }
    }

    /// Run one sync now.
    ///
    /// Fails with [`SyncError::InProgress`] instead of waiting if another
    /// run holds the lock.
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.running.try_lock().map_err(|_| SyncError::InProgress)?;
        // The database stores microseconds.
        let run_at = Utc::now().trunc_subsecs(6);
        Pipeline::new(&self.database, &self.sheet, run_at).run().await
    }

    #[cfg(test)]
    pub fn database(&self) -> &D {
        &self.database
    }

    #[cfg(test)]
    pub fn sheet(&self) -> &S {
        &self.sheet
    }
}
