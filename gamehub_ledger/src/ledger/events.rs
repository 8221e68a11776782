//! Committed state transitions and the observer that receives them.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::models::UserId;

/// A state transition that has been committed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    PurchaseCreated {
        transaction_id: i64,
        buyer_id: UserId,
        seller_id: UserId,
        asset_id: i64,
        amount: i64,
    },
    PurchaseApproved {
        transaction_id: i64,
        admin_id: UserId,
        seller_id: UserId,
        seller_amount: i64,
        platform_account_id: UserId,
        platform_fee: i64,
    },
    PurchaseRejected {
        transaction_id: i64,
        admin_id: UserId,
        buyer_id: UserId,
        refunded: i64,
    },
    DepositRequested {
        request_id: i64,
        user_id: UserId,
        amount: i64,
    },
    DepositApproved {
        request_id: i64,
        admin_id: UserId,
        user_id: UserId,
        amount: i64,
    },
    DepositRejected {
        request_id: i64,
        admin_id: UserId,
        user_id: UserId,
    },
    WithdrawRequested {
        request_id: i64,
        user_id: UserId,
        amount: i64,
    },
    WithdrawApproved {
        request_id: i64,
        admin_id: UserId,
        user_id: UserId,
        amount: i64,
    },
    WithdrawRejected {
        request_id: i64,
        admin_id: UserId,
        user_id: UserId,
    },
    PaymentInfoUpdated {
        user_id: UserId,
        payment_info_id: i64,
    },
    PointsAwarded {
        player_id: UserId,
        game_id: i64,
        developer_id: UserId,
        action: String,
        points: i64,
        total_points: i64,
    },
    GiftRedeemed {
        transaction_id: i64,
        player_id: UserId,
        gift_id: i64,
        points_spent: i64,
        remaining_points: i64,
        remaining_stock: i64,
    },
}

impl LedgerEvent {
    /// Short name used as a log/metric key
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::PurchaseCreated { .. } => "purchase_created",
            LedgerEvent::PurchaseApproved { .. } => "purchase_approved",
            LedgerEvent::PurchaseRejected { .. } => "purchase_rejected",
            LedgerEvent::DepositRequested { .. } => "deposit_requested",
            LedgerEvent::DepositApproved { .. } => "deposit_approved",
            LedgerEvent::DepositRejected { .. } => "deposit_rejected",
            LedgerEvent::WithdrawRequested { .. } => "withdraw_requested",
            LedgerEvent::WithdrawApproved { .. } => "withdraw_approved",
            LedgerEvent::WithdrawRejected { .. } => "withdraw_rejected",
            LedgerEvent::PaymentInfoUpdated { .. } => "payment_info_updated",
            LedgerEvent::PointsAwarded { .. } => "points_awarded",
            LedgerEvent::GiftRedeemed { .. } => "gift_redeemed",
        }
    }
}

/// Receives every committed state transition.
///
/// Called after the storage transaction commits, never for work that was
/// rolled back. Implementations must not block.
pub trait LedgerObserver: Send + Sync {
    fn on_committed(&self, event: &LedgerEvent);
}

/// Writes each event as a JSON audit line through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LedgerObserver for LogObserver {
    fn on_committed(&self, event: &LedgerEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!(target: "gamehub_ledger::audit", "{json}"),
            Err(e) => log::error!("Failed to serialize ledger event {}: {}", event.kind(), e),
        }
    }
}

/// Keeps every event in memory, in commit order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl LedgerObserver for RecordingObserver {
    fn on_committed(&self, event: &LedgerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
