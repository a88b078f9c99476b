//! Errors that end a sync run.

use sheetsync_engine::EntityKind;
use std::fmt;

/// Which remote store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Database,
    Sheet,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Database => f.write_str("database"),
            Store::Sheet => f.write_str("sheet"),
        }
    }
}

/// Fatal errors for a sync run.
///
/// Row-level problems never surface here; they land in the run summary.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Adapter I/O failure. Writes made before it are kept.
    #[error("{store} unavailable: {source}")]
    StoreUnavailable {
        store: Store,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The sheet layout cannot be read safely.
    #[error(transparent)]
    Layout(#[from] sheetsync_engine::Error),

    #[error("no sheet tab named '{0}'")]
    TabNotFound(EntityKind),

    #[error("a sync run is already in progress")]
    InProgress,
}

impl SyncError {
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SyncError::StoreUnavailable {
            store: Store::Database,
            source: source.into(),
        }
    }

    pub fn sheet(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SyncError::StoreUnavailable {
            store: Store::Sheet,
            source: source.into(),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::database(e)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::sheet(e)
    }
}
