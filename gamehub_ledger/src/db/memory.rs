//! In-process ledger store.
//!
//! One unit of work runs at a time: `begin` takes an owned lock on the whole
//! state and works on a copy of it, which replaces the shared state on
//! commit and is dropped on rollback. This gives serializable isolation
//! with the same observable behavior as the PostgreSQL store, including
//! the CHECK and UNIQUE backstops of the schema.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::repository::{
    AccountStore, EscrowStore, GiftStore, LedgerStore, PaymentStore, PointsStore, StoreTx,
};
use crate::escrow::{
    Asset, AssetId, AssetType, EscrowFilter, EscrowId, EscrowTransaction, NewEscrowTransaction,
    TransactionType,
};
use crate::gifts::{Gift, GiftId, GiftTransaction, NewGiftTransaction};
use crate::ledger::{
    ApprovalStatus, LedgerError, LedgerResult, Page, PageRequest, Resolution, Role, User, UserId,
};
use crate::payments::{
    DepositRequest, NewDepositRequest, NewWithdrawRequest, PaymentDetails, PaymentInfo,
    RequestFilter, RequestId, WithdrawRequest,
};
use crate::rewards::{
    Game, GameId, LeaderboardEntry, NewPointTransaction, PlayerDeveloperPoints, PointActionType,
    PointTransaction,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    assets: BTreeMap<AssetId, Asset>,
    games: BTreeMap<GameId, Game>,
    gifts: BTreeMap<GiftId, Gift>,
    escrows: BTreeMap<EscrowId, EscrowTransaction>,
    deposits: BTreeMap<RequestId, DepositRequest>,
    withdraws: BTreeMap<RequestId, WithdrawRequest>,
    payment_infos: BTreeMap<UserId, PaymentInfo>,
    point_transactions: BTreeMap<i64, PointTransaction>,
    points: BTreeMap<(UserId, UserId), PlayerDeveloperPoints>,
    gift_transactions: BTreeMap<i64, GiftTransaction>,
    last_id: i64,
    clock: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Wall-clock time, nudged forward so no two writes share a timestamp
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }
}

/// In-process ledger store for tests and local runs
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user account
    pub async fn insert_user(&self, email: &str, role: Role, balance: i64) -> User {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let user = User {
            id: state.next_id(),
            email: email.to_string(),
            full_name: None,
            role,
            balance,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Seed an approved paid asset
    pub async fn insert_asset(&self, designer_id: UserId, name: &str, price: i64) -> Asset {
        self.insert_asset_with(
            designer_id,
            name,
            AssetType::Paid,
            ApprovalStatus::Approved,
            price,
        )
        .await
    }

    /// Seed an asset with an explicit type and moderation status
    pub async fn insert_asset_with(
        &self,
        designer_id: UserId,
        name: &str,
        asset_type: AssetType,
        status: ApprovalStatus,
        price: i64,
    ) -> Asset {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let asset = Asset {
            id,
            designer_id,
            name: name.to_string(),
            asset_type,
            status,
            price,
            file_url: format!("https://files.example.com/assets/{id}"),
        };
        state.assets.insert(id, asset.clone());
        asset
    }

    /// Seed a game
    pub async fn insert_game(&self, developer_id: UserId, name: &str, support_points: bool) -> Game {
        let mut state = self.state.lock().await;
        let game = Game {
            id: state.next_id(),
            developer_id,
            name: name.to_string(),
            support_points,
        };
        state.games.insert(game.id, game.clone());
        game
    }

    /// Seed a gift
    pub async fn insert_gift(
        &self,
        developer_id: UserId,
        name: &str,
        point_cost: i64,
        quantity: i64,
    ) -> Gift {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let gift = Gift {
            id: state.next_id(),
            developer_id,
            name: name.to_string(),
            description: None,
            image_url: None,
            point_cost,
            quantity,
            created_at: now,
        };
        state.gifts.insert(gift.id, gift.clone());
        gift
    }

    /// Catalog edit: change an asset's price and download URL
    pub async fn update_asset_listing(
        &self,
        asset_id: AssetId,
        price: i64,
        file_url: &str,
    ) -> Option<Asset> {
        let mut state = self.state.lock().await;
        let asset = state.assets.get_mut(&asset_id)?;
        asset.price = price;
        asset.file_url = file_url.to_string();
        Some(asset.clone())
    }

    /// Catalog edit: change a gift's point cost
    pub async fn update_gift_cost(&self, gift_id: GiftId, point_cost: i64) -> Option<Gift> {
        let mut state = self.state.lock().await;
        let gift = state.gifts.get_mut(&gift_id)?;
        gift.point_cost = point_cost;
        Some(gift.clone())
    }

    /// Committed user row
    pub async fn user(&self, user_id: UserId) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    /// Committed balance, zero for an unknown user
    pub async fn balance(&self, user_id: UserId) -> i64 {
        self.user(user_id).await.map_or(0, |u| u.balance)
    }

    /// Committed gift row
    pub async fn gift(&self, gift_id: GiftId) -> Option<Gift> {
        self.state.lock().await.gifts.get(&gift_id).cloned()
    }

    /// Committed escrow transaction
    pub async fn escrow(&self, id: EscrowId) -> Option<EscrowTransaction> {
        self.state.lock().await.escrows.get(&id).cloned()
    }

    /// Number of committed award records
    pub async fn point_transaction_count(&self) -> usize {
        self.state.lock().await.point_transactions.len()
    }

    /// Number of committed redemption records
    pub async fn gift_transaction_count(&self) -> usize {
        self.state.lock().await.gift_transactions.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

/// Open in-process transaction: the shared state stays locked until commit
/// or rollback, writes go to `working`
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryTx {
    async fn find_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> LedgerResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn lock_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>> {
        self.find_user(user_id).await
    }

    async fn write_balance(&mut self, user_id: UserId, balance: i64) -> LedgerResult<()> {
        if balance < 0 {
            return Err(check_violation("users.balance"));
        }
        let now = self.working.tick();
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or_else(|| LedgerError::not_found("User", user_id))?;
        user.balance = balance;
        user.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl EscrowStore for MemoryTx {
    async fn find_asset(&mut self, asset_id: AssetId) -> LedgerResult<Option<Asset>> {
        Ok(self.working.assets.get(&asset_id).cloned())
    }

    async fn has_approved_purchase(
        &mut self,
        buyer_id: UserId,
        asset_id: AssetId,
    ) -> LedgerResult<bool> {
        Ok(self.working.escrows.values().any(|tx| {
            tx.buyer_id == buyer_id
                && tx.asset_id == asset_id
                && tx.status == ApprovalStatus::Approved
        }))
    }

    async fn insert_escrow(
        &mut self,
        new: &NewEscrowTransaction,
    ) -> LedgerResult<EscrowTransaction> {
        let tx = EscrowTransaction {
            id: self.working.next_id(),
            transaction_type: TransactionType::AssetPurchase,
            amount: new.split.amount,
            platform_fee: new.split.platform_fee,
            seller_amount: new.split.seller_amount,
            status: ApprovalStatus::Pending,
            buyer_id: new.buyer_id,
            seller_id: new.seller_id,
            asset_id: new.asset_id,
            file_url: new.file_url.clone(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: self.working.tick(),
        };
        self.working.escrows.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn lock_escrow(&mut self, id: EscrowId) -> LedgerResult<Option<EscrowTransaction>> {
        Ok(self.working.escrows.get(&id).cloned())
    }

    async fn resolve_escrow(
        &mut self,
        id: EscrowId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<EscrowTransaction>> {
        let now = self.working.tick();
        let Some(tx) = self.working.escrows.get_mut(&id) else {
            return Ok(None);
        };
        if !tx.status.is_pending() {
            return Ok(None);
        }
        tx.status = resolution.status;
        tx.approved_by = Some(resolution.admin_id);
        tx.approved_at = Some(now);
        if resolution.status == ApprovalStatus::Rejected {
            tx.rejection_reason = resolution.note.clone();
        }
        Ok(Some(tx.clone()))
    }

    async fn list_escrows(
        &mut self,
        filter: &EscrowFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>> {
        let mut items: Vec<_> = self
            .working
            .escrows
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_sorted(items, page))
    }
}

#[async_trait]
impl PaymentStore for MemoryTx {
    async fn insert_deposit(&mut self, new: &NewDepositRequest) -> LedgerResult<DepositRequest> {
        let now = self.working.tick();
        let request = DepositRequest {
            id: self.working.next_id(),
            user_id: new.user_id,
            amount: new.amount,
            status: ApprovalStatus::Pending,
            transaction_note: new.transaction_note.clone(),
            admin_note: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.deposits.insert(request.id, request.clone());
        Ok(request)
    }

    async fn lock_deposit(&mut self, id: RequestId) -> LedgerResult<Option<DepositRequest>> {
        Ok(self.working.deposits.get(&id).cloned())
    }

    async fn resolve_deposit(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<DepositRequest>> {
        let now = self.working.tick();
        let Some(request) = self.working.deposits.get_mut(&id) else {
            return Ok(None);
        };
        if !request.status.is_pending() {
            return Ok(None);
        }
        request.status = resolution.status;
        request.approved_by = Some(resolution.admin_id);
        request.approved_at = Some(now);
        request.admin_note = resolution.note.clone();
        request.updated_at = now;
        Ok(Some(request.clone()))
    }

    async fn list_deposits(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<DepositRequest>> {
        let mut items: Vec<_> = self
            .working
            .deposits
            .values()
            .filter(|r| filter.matches(r.status, r.user_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_sorted(items, page))
    }

    async fn insert_withdraw(
        &mut self,
        new: &NewWithdrawRequest,
    ) -> LedgerResult<WithdrawRequest> {
        let now = self.working.tick();
        let request = WithdrawRequest {
            id: self.working.next_id(),
            user_id: new.user_id,
            amount: new.amount,
            status: ApprovalStatus::Pending,
            user_note: new.user_note.clone(),
            admin_note: None,
            destination: new.destination.clone(),
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.withdraws.insert(request.id, request.clone());
        Ok(request)
    }

    async fn lock_withdraw(&mut self, id: RequestId) -> LedgerResult<Option<WithdrawRequest>> {
        Ok(self.working.withdraws.get(&id).cloned())
    }

    async fn resolve_withdraw(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<WithdrawRequest>> {
        let now = self.working.tick();
        let Some(request) = self.working.withdraws.get_mut(&id) else {
            return Ok(None);
        };
        if !request.status.is_pending() {
            return Ok(None);
        }
        request.status = resolution.status;
        request.approved_by = Some(resolution.admin_id);
        request.approved_at = Some(now);
        request.admin_note = resolution.note.clone();
        request.updated_at = now;
        Ok(Some(request.clone()))
    }

    async fn list_withdraws(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<WithdrawRequest>> {
        let mut items: Vec<_> = self
            .working
            .withdraws
            .values()
            .filter(|r| filter.matches(r.status, r.user_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_sorted(items, page))
    }

    async fn find_payment_info(&mut self, user_id: UserId) -> LedgerResult<Option<PaymentInfo>> {
        Ok(self.working.payment_infos.get(&user_id).cloned())
    }

    async fn upsert_payment_info(
        &mut self,
        user_id: UserId,
        details: &PaymentDetails,
        qr_code_url: Option<&str>,
    ) -> LedgerResult<PaymentInfo> {
        let now = self.working.tick();
        let existing = self.working.payment_infos.get(&user_id).cloned();
        let info = match existing {
            Some(existing) => PaymentInfo {
                details: details.clone(),
                qr_code_url: qr_code_url.map(str::to_string),
                updated_at: now,
                ..existing
            },
            None => PaymentInfo {
                id: self.working.next_id(),
                user_id,
                details: details.clone(),
                qr_code_url: qr_code_url.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
        };
        self.working.payment_infos.insert(user_id, info.clone());
        Ok(info)
    }
}

#[async_trait]
impl PointsStore for MemoryTx {
    async fn find_game(&mut self, game_id: GameId) -> LedgerResult<Option<Game>> {
        Ok(self.working.games.get(&game_id).cloned())
    }

    async fn point_award_exists(
        &mut self,
        player_id: UserId,
        game_id: GameId,
        action_type: PointActionType,
    ) -> LedgerResult<bool> {
        Ok(self.working.point_transactions.values().any(|t| {
            t.player_id == player_id && t.game_id == game_id && t.action_type == action_type
        }))
    }

    async fn insert_point_transaction(
        &mut self,
        new: &NewPointTransaction,
    ) -> LedgerResult<PointTransaction> {
        if self
            .point_award_exists(new.player_id, new.game_id, new.action_type)
            .await?
        {
            return Err(LedgerError::AlreadyAwarded {
                player_id: new.player_id,
                game_id: new.game_id,
                action: new.action_type.to_string(),
            });
        }
        if new.points < 0 {
            return Err(check_violation("point_transactions.points"));
        }

        let record = PointTransaction {
            id: self.working.next_id(),
            player_id: new.player_id,
            game_id: new.game_id,
            action_type: new.action_type,
            points: new.points,
            created_at: self.working.tick(),
        };
        self.working
            .point_transactions
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn lock_or_create_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        if let Some(row) = self.working.points.get(&(player_id, developer_id)) {
            return Ok(row.clone());
        }
        let row = PlayerDeveloperPoints {
            player_id,
            developer_id,
            total_points: 0,
            last_updated: self.working.tick(),
        };
        self.working
            .points
            .insert((player_id, developer_id), row.clone());
        Ok(row)
    }

    async fn write_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
        total_points: i64,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        if total_points < 0 {
            return Err(check_violation("player_developer_points.total_points"));
        }
        let now = self.working.tick();
        let row = self
            .working
            .points
            .get_mut(&(player_id, developer_id))
            .ok_or_else(|| {
                LedgerError::not_found("Points", format!("{player_id}/{developer_id}"))
            })?;
        row.total_points = total_points;
        row.last_updated = now;
        Ok(row.clone())
    }

    async fn find_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<Option<PlayerDeveloperPoints>> {
        Ok(self.working.points.get(&(player_id, developer_id)).cloned())
    }

    async fn list_points_for_player(
        &mut self,
        player_id: UserId,
    ) -> LedgerResult<Vec<PlayerDeveloperPoints>> {
        let mut rows: Vec<_> = self
            .working
            .points
            .values()
            .filter(|p| p.player_id == player_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(a.developer_id.cmp(&b.developer_id))
        });
        Ok(rows)
    }

    async fn leaderboard(
        &mut self,
        developer_id: UserId,
        limit: u32,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let mut rows: Vec<_> = self
            .working
            .points
            .values()
            .filter(|p| p.developer_id == developer_id)
            .collect();
        rows.sort_by(|a, b| {
            (b.total_points, b.last_updated).cmp(&(a.total_points, a.last_updated))
        });

        Ok(rows
            .into_iter()
            .take(limit as usize)
            .zip(1u32..)
            .map(|(row, rank)| LeaderboardEntry {
                rank,
                player_id: row.player_id,
                player_email: self
                    .working
                    .users
                    .get(&row.player_id)
                    .map(|u| u.email.clone())
                    .unwrap_or_default(),
                total_points: row.total_points,
                last_updated: row.last_updated,
            })
            .collect())
    }

    async fn list_point_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<PointTransaction>> {
        let mut items: Vec<_> = self
            .working
            .point_transactions
            .values()
            .filter(|t| t.player_id == player_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_sorted(items, page))
    }
}

#[async_trait]
impl GiftStore for MemoryTx {
    async fn lock_gift(&mut self, gift_id: GiftId) -> LedgerResult<Option<Gift>> {
        Ok(self.working.gifts.get(&gift_id).cloned())
    }

    async fn write_gift_quantity(&mut self, gift_id: GiftId, quantity: i64) -> LedgerResult<Gift> {
        if quantity < 0 {
            return Err(check_violation("gifts.quantity"));
        }
        let gift = self
            .working
            .gifts
            .get_mut(&gift_id)
            .ok_or_else(|| LedgerError::not_found("Gift", gift_id))?;
        gift.quantity = quantity;
        Ok(gift.clone())
    }

    async fn insert_gift_transaction(
        &mut self,
        new: &NewGiftTransaction,
    ) -> LedgerResult<GiftTransaction> {
        let record = GiftTransaction {
            id: self.working.next_id(),
            player_id: new.player_id,
            gift_id: new.gift_id,
            points_spent: new.points_spent,
            created_at: self.working.tick(),
        };
        self.working
            .gift_transactions
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_gift_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<GiftTransaction>> {
        let mut items: Vec<_> = self
            .working
            .gift_transactions
            .values()
            .filter(|t| t.player_id == player_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Page::from_sorted(items, page))
    }
}

fn check_violation(column: &str) -> LedgerError {
    LedgerError::validation(format!("check constraint violated: {column} cannot be negative"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let user = store.insert_user("p@example.com", Role::Player, 100).await;

        let mut tx = store.begin().await.unwrap();
        tx.write_balance(user.id, 40).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.balance(user.id).await, 100);

        let mut tx = store.begin().await.unwrap();
        tx.write_balance(user.id, 40).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.balance(user.id).await, 40);
    }

    #[tokio::test]
    async fn test_dropped_transaction_releases_lock() {
        let store = MemoryStore::new();
        let user = store.insert_user("p@example.com", Role::Player, 100).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.write_balance(user.id, 0).await.unwrap();
        }
        assert_eq!(store.balance(user.id).await, 100);
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = MemoryStore::new();
        let user = store.insert_user("p@example.com", Role::Player, 100).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.write_balance(user.id, -1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_award_rejected_by_store() {
        let store = MemoryStore::new();
        let dev = store.insert_user("d@example.com", Role::Developer, 0).await;
        let player = store.insert_user("p@example.com", Role::Player, 0).await;
        let game = store.insert_game(dev.id, "Orbit", true).await;

        let new = NewPointTransaction {
            player_id: player.id,
            game_id: game.id,
            action_type: PointActionType::DownloadGame,
            points: 10,
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_point_transaction(&new).await.unwrap();
        let err = tx.insert_point_transaction(&new).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyAwarded { .. }));
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let mut state = MemoryState::default();
        let a = state.tick();
        let b = state.tick();
        let c = state.tick();
        assert!(a < b && b < c);
    }
}
