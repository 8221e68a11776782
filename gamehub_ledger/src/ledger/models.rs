//! Shared ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::LedgerError;

/// User ID type
pub type UserId = i64;

/// User role as issued by the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Player,
    Developer,
    Designer,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Player => write!(f, "PLAYER"),
            Role::Developer => write!(f, "DEVELOPER"),
            Role::Designer => write!(f, "DESIGNER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAYER" => Ok(Role::Player),
            "DEVELOPER" => Ok(Role::Developer),
            "DESIGNER" => Ok(Role::Designer),
            "ADMIN" => Ok(Role::Admin),
            other => Err(LedgerError::validation(format!("unknown role {other}"))),
        }
    }
}

/// User record carrying the spendable balance.
///
/// `balance` is a whole number of currency units and is never negative at
/// rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status shared by escrow transactions, deposit and withdraw requests.
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_pending(self) -> bool {
        self == ApprovalStatus::Pending
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "PENDING"),
            ApprovalStatus::Approved => write!(f, "APPROVED"),
            ApprovalStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            other => Err(LedgerError::validation(format!("unknown status {other}"))),
        }
    }
}

/// Admin decision applied to a pending record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: ApprovalStatus,
    pub admin_id: UserId,
    /// Rejection reason for purchases, admin note for deposit/withdraw requests
    pub note: Option<String>,
}

impl Resolution {
    pub fn approve(admin_id: UserId, note: Option<String>) -> Self {
        Self {
            status: ApprovalStatus::Approved,
            admin_id,
            note,
        }
    }

    pub fn reject(admin_id: UserId, note: Option<String>) -> Self {
        Self {
            status: ApprovalStatus::Rejected,
            admin_id,
            note,
        }
    }
}

/// Zero-based page request; a size of zero means the configured default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

/// One page of a collection sorted newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Cut one page out of an already-sorted collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Self {
            items,
            page: request.page,
            size: request.size,
            total,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.size))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}
