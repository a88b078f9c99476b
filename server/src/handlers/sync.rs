//! Sync handler - runs one sync on demand.

use crate::error::Result;
use crate::AppState;
use sheetsync_engine::SyncSummary;

/// Run a sync now and report what it did.
pub async fn handle_sync(state: &AppState) -> Result<SyncSummary> {
    let summary = state.sync.run().await?;

    tracing::info!(
        categories = summary.categories.writes(),
        words = summary.words.writes(),
        "Sync requested over HTTP finished"
    );
    Ok(summary)
}
