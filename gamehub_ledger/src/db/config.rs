//! Database configuration module.
//!
//! Provides configuration structures for database connection management.

use std::env;
use std::str::FromStr;

use crate::ledger::{LedgerError, LedgerResult};

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 20)
    /// - `DB_MIN_CONNECTIONS`: Minimum pool size (default: 5)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    /// - `DB_IDLE_TIMEOUT`: Idle timeout in seconds (default: 600)
    /// - `DB_MAX_LIFETIME`: Max lifetime in seconds (default: 1800)
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - `DATABASE_URL` unset, or a numeric
    ///   variable does not parse
    pub fn from_env() -> LedgerResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| LedgerError::validation("DATABASE_URL must be set"))?;
        let defaults = Self::development();

        let config = Self {
            database_url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: parse_env(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME", defaults.max_lifetime_secs)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration for development
    ///
    /// Uses `postgres://postgres@localhost/gamehub` as the database URL
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/gamehub".to_string(),
            max_connections: 20,
            min_connections: 5,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }

    /// Validate pool sizing
    pub fn validate(&self) -> LedgerResult<()> {
        if self.max_connections == 0 {
            return Err(LedgerError::validation(
                "DB_MAX_CONNECTIONS must be greater than 0",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(LedgerError::validation(format!(
                "DB_MIN_CONNECTIONS ({}) cannot exceed DB_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Parse an optional numeric variable; a present but malformed value is an error
fn parse_env<T: FromStr>(key: &str, default: T) -> LedgerResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| LedgerError::validation(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
