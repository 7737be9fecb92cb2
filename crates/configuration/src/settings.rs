use crate::error::ConfigError;
use core_types::DEFAULT_LIMIT;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub listing: ListingSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Checks the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.acquire_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "database.acquire_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.listing.max_limit == 0 {
            return Err(ConfigError::ValidationError(
                "listing.max_limit must be at least 1".to_string(),
            ));
        }
        if self.listing.default_limit > self.listing.max_limit {
            return Err(ConfigError::ValidationError(format!(
                "listing.default_limit ({}) exceeds listing.max_limit ({})",
                self.listing.default_limit, self.listing.max_limit
            )));
        }
        Ok(())
    }
}

/// Where and how to reach PostgreSQL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// A full connection URL. When set, the discrete fields below are ignored
    /// except for the pool sizing.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// One of `disable`, `allow`, `prefer`, `require`, `verify-ca`, `verify-full`.
    /// Applies on top of `url` too; unset keeps the url's `sslmode` (or `prefer`).
    pub ssl_mode: Option<String>,
    /// PEM file with the CA certificate used to verify the server.
    pub ssl_root_cert: Option<PathBuf>,
    /// Cloud SQL instance (`project:region:instance`). Switches the connection
    /// to the `/cloudsql/<instance>` unix socket.
    pub cloud_sql_connection_name: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            name: "shows".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            ssl_mode: None,
            ssl_root_cert: None,
            cloud_sql_connection_name: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

/// Paging defaults applied by the caller layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub default_limit: u32,
    /// Upper bound on any requested page size.
    pub max_limit: u32,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: 1000,
        }
    }
}

impl ListingSettings {
    /// The page size to use for a request: the default when none was asked
    /// for, never more than `max_limit`.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is not set, e.g. `info` or `database=debug,info`.
    pub level: String,
    /// Also write a daily-rolling log file into this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "shows-catalog.log".to_string(),
        }
    }
}
