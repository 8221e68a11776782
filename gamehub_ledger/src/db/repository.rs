//! Storage traits the ledger engines run against.
//!
//! A [`LedgerStore`] hands out one [`StoreTx`] per unit of work. Every method
//! on a `StoreTx` runs inside that storage transaction; nothing is visible to
//! other transactions until [`StoreTx::commit`]. Methods named `lock_*` take
//! a row lock that is held until commit or rollback.

use async_trait::async_trait;

use crate::escrow::{Asset, AssetId, EscrowFilter, EscrowId, EscrowTransaction, NewEscrowTransaction};
use crate::gifts::{Gift, GiftId, GiftTransaction, NewGiftTransaction};
use crate::ledger::{LedgerResult, Page, PageRequest, Resolution, User, UserId};
use crate::payments::{
    DepositRequest, NewDepositRequest, NewWithdrawRequest, PaymentDetails, PaymentInfo,
    RequestFilter, RequestId, WithdrawRequest,
};
use crate::rewards::{
    Game, GameId, LeaderboardEntry, NewPointTransaction, PlayerDeveloperPoints, PointActionType,
    PointTransaction,
};

/// Opens storage transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin a new storage transaction
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>>;
}

/// One open storage transaction
#[async_trait]
pub trait StoreTx: AccountStore + EscrowStore + PaymentStore + PointsStore + GiftStore + Send {
    /// Make every write of this transaction durable and visible
    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    /// Discard every write of this transaction
    async fn rollback(self: Box<Self>) -> LedgerResult<()>;
}

/// User accounts and balances
#[async_trait]
pub trait AccountStore: Send {
    /// Find user by ID
    async fn find_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>>;

    /// Find user by email
    async fn find_user_by_email(&mut self, email: &str) -> LedgerResult<Option<User>>;

    /// Find user by ID and lock the row
    async fn lock_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>>;

    /// Overwrite the balance of a locked user row
    async fn write_balance(&mut self, user_id: UserId, balance: i64) -> LedgerResult<()>;
}

/// Asset purchases held in escrow
#[async_trait]
pub trait EscrowStore: Send {
    /// Find asset by ID
    async fn find_asset(&mut self, asset_id: AssetId) -> LedgerResult<Option<Asset>>;

    /// Whether the buyer already owns the asset through an approved purchase
    async fn has_approved_purchase(
        &mut self,
        buyer_id: UserId,
        asset_id: AssetId,
    ) -> LedgerResult<bool>;

    /// Insert a pending purchase
    async fn insert_escrow(
        &mut self,
        new: &NewEscrowTransaction,
    ) -> LedgerResult<EscrowTransaction>;

    /// Find escrow transaction by ID and lock the row
    async fn lock_escrow(&mut self, id: EscrowId) -> LedgerResult<Option<EscrowTransaction>>;

    /// Apply a resolution if the transaction is still pending.
    ///
    /// Returns the updated row, or `None` when the transaction was not
    /// pending any more.
    async fn resolve_escrow(
        &mut self,
        id: EscrowId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<EscrowTransaction>>;

    /// List escrow transactions, newest first
    async fn list_escrows(
        &mut self,
        filter: &EscrowFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>>;
}

/// Deposit/withdraw requests and payment destinations
#[async_trait]
pub trait PaymentStore: Send {
    async fn insert_deposit(&mut self, new: &NewDepositRequest) -> LedgerResult<DepositRequest>;

    async fn lock_deposit(&mut self, id: RequestId) -> LedgerResult<Option<DepositRequest>>;

    /// Apply a resolution if the request is still pending
    async fn resolve_deposit(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<DepositRequest>>;

    async fn list_deposits(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<DepositRequest>>;

    async fn insert_withdraw(&mut self, new: &NewWithdrawRequest)
    -> LedgerResult<WithdrawRequest>;

    async fn lock_withdraw(&mut self, id: RequestId) -> LedgerResult<Option<WithdrawRequest>>;

    /// Apply a resolution if the request is still pending
    async fn resolve_withdraw(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<WithdrawRequest>>;

    async fn list_withdraws(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<WithdrawRequest>>;

    /// Active payment destination of a user
    async fn find_payment_info(&mut self, user_id: UserId) -> LedgerResult<Option<PaymentInfo>>;

    /// Replace the active payment destination of a user
    async fn upsert_payment_info(
        &mut self,
        user_id: UserId,
        details: &PaymentDetails,
        qr_code_url: Option<&str>,
    ) -> LedgerResult<PaymentInfo>;
}

/// Reward points
#[async_trait]
pub trait PointsStore: Send {
    async fn find_game(&mut self, game_id: GameId) -> LedgerResult<Option<Game>>;

    async fn point_award_exists(
        &mut self,
        player_id: UserId,
        game_id: GameId,
        action_type: PointActionType,
    ) -> LedgerResult<bool>;

    /// Insert an award record.
    ///
    /// Fails with `LedgerError::AlreadyAwarded` when a record for the same
    /// (player, game, action) exists.
    async fn insert_point_transaction(
        &mut self,
        new: &NewPointTransaction,
    ) -> LedgerResult<PointTransaction>;

    /// Lock the points row of a (player, developer) pair, creating it with
    /// zero points first when it does not exist
    async fn lock_or_create_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<PlayerDeveloperPoints>;

    /// Overwrite the total of a locked points row and stamp `last_updated`
    async fn write_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
        total_points: i64,
    ) -> LedgerResult<PlayerDeveloperPoints>;

    async fn find_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<Option<PlayerDeveloperPoints>>;

    /// All points rows of a player
    async fn list_points_for_player(
        &mut self,
        player_id: UserId,
    ) -> LedgerResult<Vec<PlayerDeveloperPoints>>;

    /// Top players of a developer ordered by
    /// `(total_points DESC, last_updated DESC)`
    async fn leaderboard(
        &mut self,
        developer_id: UserId,
        limit: u32,
    ) -> LedgerResult<Vec<LeaderboardEntry>>;

    async fn list_point_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<PointTransaction>>;
}

/// Gift stock and redemptions
#[async_trait]
pub trait GiftStore: Send {
    async fn lock_gift(&mut self, gift_id: GiftId) -> LedgerResult<Option<Gift>>;

    /// Overwrite the quantity of a locked gift row
    async fn write_gift_quantity(&mut self, gift_id: GiftId, quantity: i64) -> LedgerResult<Gift>;

    async fn insert_gift_transaction(
        &mut self,
        new: &NewGiftTransaction,
    ) -> LedgerResult<GiftTransaction>;

    async fn list_gift_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<GiftTransaction>>;
}
