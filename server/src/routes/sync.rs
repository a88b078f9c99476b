//! Sync endpoint routes.

use axum::{extract::State, routing::post, Json, Router};

use crate::auth::Authorized;
use crate::error::Result;
use crate::handlers::handle_sync;
use crate::AppState;
use sheetsync_engine::SyncSummary;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/sync", post(sync_handler))
}

/// POST /sync - Run one sync between the database and the sheet.
async fn sync_handler(
    State(state): State<AppState>,
    _auth: Authorized,
) -> Result<Json<SyncSummary>> {
    let summary = handle_sync(&state).await?;
    Ok(Json(summary))
}
