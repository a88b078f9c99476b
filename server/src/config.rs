//! Configuration management for the server.

use std::env;
use std::time::Duration;

const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    pub database_max_connections: u32,
    /// Spreadsheet holding the `categories` and `words` tabs
    pub spreadsheet_id: String,
    /// OAuth access token for the Sheets API
    pub sheets_access_token: String,
    pub sheets_api_base: String,
    /// Bearer token required on `/sync`, if set
    pub auth_secret: Option<String>,
    /// Period of background runs; `None` disables them
    pub sync_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or(ConfigError::InvalidMaxConnections)?,
        };
        let spreadsheet_id = var("SPREADSHEET_ID").ok_or(ConfigError::Missing("SPREADSHEET_ID"))?;
        let sheets_access_token =
            var("SHEETS_ACCESS_TOKEN").ok_or(ConfigError::Missing("SHEETS_ACCESS_TOKEN"))?;
        let sheets_api_base =
            var("SHEETS_API_BASE").unwrap_or_else(|| DEFAULT_SHEETS_API.to_string());

        let auth_secret = var("AUTH_SECRET").filter(|s| !s.is_empty());

        let sync_interval = match var("SYNC_INTERVAL_SECS") {
            None => None,
            Some(raw) => match raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSyncInterval)?
            {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            spreadsheet_id,
            sheets_access_token,
            sheets_api_base,
            auth_secret,
            sync_interval,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid SYNC_INTERVAL_SECS value")]
    InvalidSyncInterval,

    #[error("DATABASE_MAX_CONNECTIONS must be a positive integer")]
    InvalidMaxConnections,
}
