//! Gift inventory and redemption models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::UserId;

/// Gift ID type
pub type GiftId = i64;

/// Finite-stock gift offered by a developer for points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    pub id: GiftId,
    pub developer_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Always positive
    pub point_cost: i64,
    /// Never negative
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable redemption record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftTransaction {
    pub id: i64,
    pub player_id: UserId,
    pub gift_id: GiftId,
    /// Gift price at redemption time
    pub points_spent: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new redemption record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewGiftTransaction {
    pub player_id: UserId,
    pub gift_id: GiftId,
    pub points_spent: i64,
}
