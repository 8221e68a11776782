//! Escrow data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ledger::{ApprovalStatus, LedgerError, LedgerResult, UserId};

/// Asset ID type
pub type AssetId = i64;

/// Escrow transaction ID type
pub type EscrowId = i64;

/// Share of every purchase retained by the platform, in percent
pub const PLATFORM_FEE_PERCENT: i64 = 10;

/// Asset pricing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Free,
    Paid,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Free => write!(f, "FREE"),
            AssetType::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for AssetType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(AssetType::Free),
            "PAID" => Ok(AssetType::Paid),
            other => Err(LedgerError::validation(format!("unknown asset type {other}"))),
        }
    }
}

/// Catalog snapshot of an asset, as read at purchase time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub designer_id: UserId,
    pub name: String,
    pub asset_type: AssetType,
    /// Catalog moderation status
    pub status: ApprovalStatus,
    pub price: i64,
    pub file_url: String,
}

/// Escrow transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    AssetPurchase,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::AssetPurchase => write!(f, "ASSET_PURCHASE"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSET_PURCHASE" => Ok(TransactionType::AssetPurchase),
            other => Err(LedgerError::validation(format!(
                "unknown transaction type {other}"
            ))),
        }
    }
}

/// Split of a purchase amount between platform and seller.
///
/// `platform_fee + seller_amount == amount` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub amount: i64,
    pub platform_fee: i64,
    pub seller_amount: i64,
}

impl FeeSplit {
    /// Split `amount` with the platform fee rounded half-up to a whole unit.
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Amount is not positive
    /// * `LedgerError::BalanceOverflow` - Amount too large to scale
    pub fn compute(amount: i64) -> LedgerResult<Self> {
        if amount <= 0 {
            return Err(LedgerError::validation(format!(
                "purchase amount must be positive, got {amount}"
            )));
        }

        let scaled = amount
            .checked_mul(PLATFORM_FEE_PERCENT)
            .and_then(|v| v.checked_add(50))
            .ok_or(LedgerError::BalanceOverflow)?;
        let platform_fee = scaled / 100;

        Ok(Self {
            amount,
            platform_fee,
            seller_amount: amount - platform_fee,
        })
    }
}

/// Escrow transaction (asset purchase held until an admin decides)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: EscrowId,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub platform_fee: i64,
    pub seller_amount: i64,
    pub status: ApprovalStatus,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub asset_id: AssetId,
    /// Copied from the asset at creation time
    pub file_url: String,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new pending purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEscrowTransaction {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub asset_id: AssetId,
    pub split: FeeSplit,
    pub file_url: String,
}

/// Listing filter for escrow transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscrowFilter {
    pub status: Option<ApprovalStatus>,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
}

impl EscrowFilter {
    pub fn matches(&self, tx: &EscrowTransaction) -> bool {
        self.status.is_none_or(|s| tx.status == s)
            && self.buyer_id.is_none_or(|b| tx.buyer_id == b)
            && self.seller_id.is_none_or(|s| tx.seller_id == s)
    }
}

/// Asset a buyer owns through an approved purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedAsset {
    pub transaction_id: EscrowId,
    pub asset_id: AssetId,
    pub seller_id: UserId,
    pub amount: i64,
    pub file_url: String,
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<EscrowTransaction> for PurchasedAsset {
    fn from(tx: EscrowTransaction) -> Self {
        Self {
            transaction_id: tx.id,
            asset_id: tx.asset_id,
            seller_id: tx.seller_id,
            amount: tx.amount,
            file_url: tx.file_url,
            approved_at: tx.approved_at,
        }
    }
}
