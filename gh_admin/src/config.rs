//! Console configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use gamehub_ledger::{LedgerConfig, db::DatabaseConfig};

/// Complete console configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Ledger engine configuration
    pub ledger: LedgerConfig,
    /// Admin acting on approve and reject commands
    pub admin_email: Option<String>,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `admin_override` - Optional acting admin email (from CLI args)
    /// * `platform_account_override` - Optional fee account email (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if `DATABASE_URL` is missing or a numeric variable does not parse
    pub fn from_env(
        database_url_override: Option<String>,
        admin_override: Option<String>,
        platform_account_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Pass --db-url or set it in .env".to_string(),
            })?;

        let defaults = DatabaseConfig::development();
        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: parse_env_or(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME", defaults.max_lifetime_secs)?,
        };

        let mut ledger = LedgerConfig::from_env();
        if let Some(account) = non_blank(platform_account_override) {
            ledger.platform_account_email = Some(account);
        }

        let admin_email = non_blank(admin_override.or_else(|| std::env::var("ADMIN_EMAIL").ok()));

        Ok(AdminConfig {
            database,
            ledger,
            admin_email,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database
            .validate()
            .map_err(|e| ConfigError::Invalid {
                var: "DB_*".to_string(),
                reason: e.to_string(),
            })?;

        self.ledger.validate().map_err(|e| ConfigError::Invalid {
            var: "LEDGER".to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Acting admin email, required by approve and reject commands
    pub fn require_admin(&self) -> Result<&str, ConfigError> {
        self.admin_email
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "ADMIN_EMAIL".to_string(),
                hint: "Pass --admin EMAIL or set ADMIN_EMAIL".to_string(),
            })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{raw}' is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
