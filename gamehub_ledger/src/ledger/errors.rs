//! Ledger error types.

use super::models::ApprovalStatus;
use thiserror::Error;

/// Errors raised by the ledger engines.
///
/// Every error aborts the unit of work it was raised in, so no balance,
/// points or stock change is ever partially visible.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A precondition failed before any mutation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Transition attempted on a record that is no longer pending
    #[error("{entity} {id} is already {status}")]
    InvalidState {
        entity: &'static str,
        id: i64,
        status: ApprovalStatus,
    },

    /// Insufficient balance
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        user_id: i64,
        available: i64,
        required: i64,
    },

    /// Not enough points with the gift's developer
    #[error("Insufficient points: available {available}, required {required}")]
    InsufficientPoints { available: i64, required: i64 },

    /// Gift has no stock left
    #[error("Gift {0} is out of stock")]
    OutOfStock(i64),

    /// Points were already awarded for this (player, game, action)
    #[error("Points already awarded to player {player_id} for {action} on game {game_id}")]
    AlreadyAwarded {
        player_id: i64,
        game_id: i64,
        action: String,
    },

    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Checked arithmetic overflowed
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Commit attempted on a unit of work in which an operation failed
    #[error("Unit of work aborted after a failed operation; nothing was committed")]
    Aborted,
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        LedgerError::Validation(reason.into())
    }

    /// Shorthand for a [`LedgerError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Report a balance shortfall as a failed precondition.
    ///
    /// Used where covering the amount is a precondition of creating a
    /// record; every other error passes through unchanged.
    pub(crate) fn shortfall_as_validation(self, action: &str) -> Self {
        match self {
            LedgerError::InsufficientFunds {
                available,
                required,
                ..
            } => LedgerError::Validation(format!(
                "insufficient balance for {action}: available {available}, required {required}"
            )),
            other => other,
        }
    }

    /// Whether retrying the same call can succeed once the input or the
    /// underlying resource changes.
    ///
    /// `InvalidState` and `AlreadyAwarded` are terminal for the record or
    /// triple they refer to.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientPoints { .. }
            | LedgerError::OutOfStock(_)
            | LedgerError::Database(_)
            | LedgerError::Aborted => true,
            LedgerError::InvalidState { .. }
            | LedgerError::AlreadyAwarded { .. }
            | LedgerError::NotFound { .. }
            | LedgerError::BalanceOverflow => false,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized and user IDs in fund errors are dropped.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) => "Internal server error".to_string(),
            LedgerError::BalanceOverflow => "Internal server error".to_string(),
            LedgerError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
