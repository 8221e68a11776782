//! Ledger engine configuration.

use std::env;

use super::errors::{LedgerError, LedgerResult};
use super::models::PageRequest;

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Account credited with platform fees.
    ///
    /// When unset, the admin approving a purchase receives the fee.
    pub platform_account_email: Option<String>,

    /// Number of rows returned by a leaderboard query
    pub leaderboard_size: u32,

    /// Page size used when the caller passes zero
    pub default_page_size: u32,

    /// Largest page a caller may request
    pub max_page_size: u32,
}

impl LedgerConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `PLATFORM_ACCOUNT_EMAIL`: Fee account (default: approving admin)
    /// - `LEADERBOARD_SIZE`: Leaderboard rows (default: 10)
    /// - `DEFAULT_PAGE_SIZE`: Default page size (default: 20)
    /// - `MAX_PAGE_SIZE`: Maximum page size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            platform_account_email: env::var("PLATFORM_ACCOUNT_EMAIL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            leaderboard_size: parse_env_or("LEADERBOARD_SIZE", defaults.leaderboard_size),
            default_page_size: parse_env_or("DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: parse_env_or("MAX_PAGE_SIZE", defaults.max_page_size),
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> LedgerResult<()> {
        if self.leaderboard_size == 0 {
            return Err(LedgerError::validation("LEADERBOARD_SIZE must be greater than 0"));
        }
        if self.default_page_size == 0 {
            return Err(LedgerError::validation("DEFAULT_PAGE_SIZE must be greater than 0"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(LedgerError::validation(format!(
                "DEFAULT_PAGE_SIZE ({}) cannot exceed MAX_PAGE_SIZE ({})",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Apply the default and maximum page size to a caller's request
    pub fn page(&self, request: PageRequest) -> PageRequest {
        let size = match request.size {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        };
        PageRequest::new(request.page, size)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            platform_account_email: None,
            leaderboard_size: 10,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
