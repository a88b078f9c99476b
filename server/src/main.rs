//! Sheetsync Server - keeps a PostgreSQL database and a Google Sheet in
//! agreement.
//!
//! A sync runs on `POST /sync` and, when `SYNC_INTERVAL_SECS` is set, on a
//! timer. Both paths share one lock, so runs never overlap within a
//! process.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;
mod sheets;
mod sync;

use crate::config::Config;
use crate::db::{Database, Pool};
use crate::sheets::SheetsClient;
use crate::sync::SyncService;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sync service over the production stores.
pub type Syncer = SyncService<Database, SheetsClient>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub sync: Arc<Syncer>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetsync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Sheetsync Server on {}:{}", config.host, config.port);

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let sheets = SheetsClient::new(
        &config.sheets_api_base,
        config.spreadsheet_id.clone(),
        config.sheets_access_token.clone(),
    )?;
    let sync = Arc::new(SyncService::new(Database::new(pool.clone()), sheets));

    if let Some(every) = config.sync_interval {
        crate::sync::spawn_scheduler(sync.clone(), every);
    }

    // Build application state
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sync,
    };

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
