//! # GameHub Ledger
//!
//! Ledger and approval engine for a digital-asset marketplace. It moves
//! balances between accounts, holds purchase funds in escrow until an admin
//! decides, accumulates reward points per player and developer, and redeems
//! finite gift stock against those points.
//!
//! ## Architecture
//!
//! Every operation runs inside one [`ledger::UnitOfWork`], a single storage
//! transaction that either fully applies or fully rolls back. Engines never
//! write balances, point totals or gift stock directly; they go through
//! the ledger primitives:
//!
//! - **BalanceLedger**: credit/debit on account balances
//! - **PointsLedger**: award/spend on (player, developer) point totals
//! - **StockLedger**: decrement on gift quantity
//!
//! Committed state transitions are published to an injected
//! [`ledger::LedgerObserver`].
//!
//! ## Core Modules
//!
//! - [`escrow`]: Asset purchases held in escrow, fee split on approval
//! - [`payments`]: Deposit and withdraw requests
//! - [`rewards`]: Exactly-once point awards and leaderboards
//! - [`gifts`]: Gift redemption against points
//! - [`db`]: Store traits, PostgreSQL and in-process stores
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gamehub_ledger::{Ledger, LedgerConfig, LogObserver, db::MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let ledger = Ledger::new(store, Arc::new(LogObserver), LedgerConfig::default());
//! let _escrow = ledger.escrow();
//! ```

use std::sync::Arc;

pub mod db;
pub mod escrow;
pub mod gifts;
pub mod ledger;
pub mod payments;
pub mod rewards;

pub use escrow::EscrowManager;
pub use gifts::GiftManager;
pub use ledger::{
    LedgerConfig, LedgerError, LedgerEvent, LedgerObserver, LedgerResult, LogObserver,
    RecordingObserver, User, UserId,
};
pub use payments::PaymentManager;
pub use rewards::RewardManager;

use db::{AccountStore, LedgerStore};
use ledger::LedgerContext;

/// Entry point bundling every engine over one store
#[derive(Clone)]
pub struct Ledger {
    ctx: LedgerContext,
    escrow: EscrowManager,
    payments: PaymentManager,
    rewards: RewardManager,
    gifts: GiftManager,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        observer: Arc<dyn LedgerObserver>,
        config: LedgerConfig,
    ) -> Self {
        let ctx = LedgerContext::new(store, observer, config);
        Self {
            escrow: EscrowManager::new(ctx.clone()),
            payments: PaymentManager::new(ctx.clone()),
            rewards: RewardManager::new(ctx.clone()),
            gifts: GiftManager::new(ctx.clone()),
            ctx,
        }
    }

    /// Shared context, for opening a unit of work that spans several engines
    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    pub fn escrow(&self) -> &EscrowManager {
        &self.escrow
    }

    pub fn payments(&self) -> &PaymentManager {
        &self.payments
    }

    pub fn rewards(&self) -> &RewardManager {
        &self.rewards
    }

    pub fn gifts(&self) -> &GiftManager {
        &self.gifts
    }

    /// Read a user account with its current balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - Unknown user
    pub async fn account(&self, user_id: UserId) -> LedgerResult<User> {
        let mut uow = self.ctx.begin().await?;
        let result = uow
            .store()
            .find_user(user_id)
            .await
            .and_then(|user| user.ok_or_else(|| LedgerError::not_found("User", user_id)));
        uow.finish(result).await
    }
}
