//! PostgreSQL ledger store.
//!
//! Every [`PgStoreTx`] wraps one sqlx transaction. `lock_*` methods use
//! `SELECT ... FOR UPDATE`, and status transitions are conditional updates
//! (`WHERE status = 'PENDING'`) so a resolution can only ever apply once.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::repository::{
    AccountStore, EscrowStore, GiftStore, LedgerStore, PaymentStore, PointsStore, StoreTx,
};
use crate::escrow::{Asset, AssetId, EscrowFilter, EscrowId, EscrowTransaction, NewEscrowTransaction};
use crate::gifts::{Gift, GiftId, GiftTransaction, NewGiftTransaction};
use crate::ledger::{
    ApprovalStatus, LedgerError, LedgerResult, Page, PageRequest, Resolution, User, UserId,
};
use crate::payments::{
    DepositRequest, NewDepositRequest, NewWithdrawRequest, PaymentDetails, PaymentInfo,
    RequestFilter, RequestId, WithdrawRequest,
};
use crate::rewards::{
    Game, GameId, LeaderboardEntry, NewPointTransaction, PlayerDeveloperPoints, PointActionType,
    PointTransaction,
};

const USER_COLUMNS: &str = "id, email, full_name, role, balance, created_at, updated_at";

const ESCROW_COLUMNS: &str = "id, transaction_type, amount, platform_fee, seller_amount, status, \
     buyer_id, seller_id, asset_id, file_url, approved_by, approved_at, rejection_reason, created_at";

const DEPOSIT_COLUMNS: &str = "id, user_id, amount, status, transaction_note, admin_note, \
     approved_by, approved_at, created_at, updated_at";

const WITHDRAW_COLUMNS: &str = "id, user_id, amount, status, user_note, admin_note, bank_name, \
     account_number, account_holder_name, approved_by, approved_at, created_at, updated_at";

const PAYMENT_INFO_COLUMNS: &str = "id, user_id, bank_name, account_number, account_holder_name, \
     qr_code_url, created_at, updated_at";

const POINTS_COLUMNS: &str = "player_id, developer_id, total_points, last_updated";

const POINT_TX_COLUMNS: &str = "id, player_id, game_id, action_type, points, created_at";

const GIFT_COLUMNS: &str =
    "id, developer_id, name, description, image_url, point_cost, quantity, created_at";

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

/// One open PostgreSQL transaction
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgStoreTx {
    async fn find_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn lock_user(&mut self, user_id: UserId) -> LedgerResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn write_balance(&mut self, user_id: UserId, balance: i64) -> LedgerResult<()> {
        let result =
            sqlx::query("UPDATE users SET balance = $1, updated_at = NOW() WHERE id = $2")
                .bind(balance)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("User", user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl EscrowStore for PgStoreTx {
    async fn find_asset(&mut self, asset_id: AssetId) -> LedgerResult<Option<Asset>> {
        let row = sqlx::query(
            "SELECT id, designer_id, name, asset_type, status, price, file_url
             FROM assets WHERE id = $1",
        )
        .bind(asset_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> LedgerResult<Asset> {
            Ok(Asset {
                id: row.get("id"),
                designer_id: row.get("designer_id"),
                name: row.get("name"),
                asset_type: row.get::<String, _>("asset_type").parse()?,
                status: row.get::<String, _>("status").parse()?,
                price: row.get("price"),
                file_url: row.get("file_url"),
            })
        })
        .transpose()
    }

    async fn has_approved_purchase(
        &mut self,
        buyer_id: UserId,
        asset_id: AssetId,
    ) -> LedgerResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(
                SELECT 1 FROM escrow_transactions
                WHERE buyer_id = $1 AND asset_id = $2 AND status = 'APPROVED'
             ) AS owned",
        )
        .bind(buyer_id)
        .bind(asset_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.get("owned"))
    }

    async fn insert_escrow(
        &mut self,
        new: &NewEscrowTransaction,
    ) -> LedgerResult<EscrowTransaction> {
        let sql = format!(
            "INSERT INTO escrow_transactions
                (transaction_type, amount, platform_fee, seller_amount, status,
                 buyer_id, seller_id, asset_id, file_url)
             VALUES ('ASSET_PURCHASE', $1, $2, $3, 'PENDING', $4, $5, $6, $7)
             RETURNING {ESCROW_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.split.amount)
            .bind(new.split.platform_fee)
            .bind(new.split.seller_amount)
            .bind(new.buyer_id)
            .bind(new.seller_id)
            .bind(new.asset_id)
            .bind(&new.file_url)
            .fetch_one(&mut *self.tx)
            .await?;

        escrow_from_row(&row)
    }

    async fn lock_escrow(&mut self, id: EscrowId) -> LedgerResult<Option<EscrowTransaction>> {
        let sql = format!("SELECT {ESCROW_COLUMNS} FROM escrow_transactions WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(escrow_from_row).transpose()
    }

    async fn resolve_escrow(
        &mut self,
        id: EscrowId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<EscrowTransaction>> {
        let reason = match resolution.status {
            ApprovalStatus::Rejected => resolution.note.as_deref(),
            _ => None,
        };
        let sql = format!(
            "UPDATE escrow_transactions
             SET status = $2, approved_by = $3, approved_at = NOW(),
                 rejection_reason = $4, updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'
             RETURNING {ESCROW_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(resolution.status.to_string())
            .bind(resolution.admin_id)
            .bind(reason)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(escrow_from_row).transpose()
    }

    async fn list_escrows(
        &mut self,
        filter: &EscrowFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>> {
        const WHERE: &str = "WHERE ($1::VARCHAR IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR buyer_id = $2)
               AND ($3::BIGINT IS NULL OR seller_id = $3)";
        let status = filter.status.map(|s| s.to_string());

        let count_sql = format!("SELECT COUNT(*) AS total FROM escrow_transactions {WHERE}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(status.as_deref())
            .bind(filter.buyer_id)
            .bind(filter.seller_id)
            .fetch_one(&mut *self.tx)
            .await?
            .get("total");

        let sql = format!(
            "SELECT {ESCROW_COLUMNS} FROM escrow_transactions {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_deref())
            .bind(filter.buyer_id)
            .bind(filter.seller_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        let items = rows
            .iter()
            .map(escrow_from_row)
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(page_of(items, page, total))
    }
}

#[async_trait]
impl PaymentStore for PgStoreTx {
    async fn insert_deposit(&mut self, new: &NewDepositRequest) -> LedgerResult<DepositRequest> {
        let sql = format!(
            "INSERT INTO deposit_requests (user_id, amount, status, transaction_note)
             VALUES ($1, $2, 'PENDING', $3)
             RETURNING {DEPOSIT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.user_id)
            .bind(new.amount)
            .bind(new.transaction_note.as_deref())
            .fetch_one(&mut *self.tx)
            .await?;
        deposit_from_row(&row)
    }

    async fn lock_deposit(&mut self, id: RequestId) -> LedgerResult<Option<DepositRequest>> {
        let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposit_requests WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    async fn resolve_deposit(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<DepositRequest>> {
        let sql = format!(
            "UPDATE deposit_requests
             SET status = $2, approved_by = $3, approved_at = NOW(),
                 admin_note = $4, updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'
             RETURNING {DEPOSIT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(resolution.status.to_string())
            .bind(resolution.admin_id)
            .bind(resolution.note.as_deref())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    async fn list_deposits(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<DepositRequest>> {
        let status = filter.status.map(|s| s.to_string());

        let count_sql = format!("SELECT COUNT(*) AS total FROM deposit_requests {REQUEST_WHERE}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(status.as_deref())
            .bind(filter.user_id)
            .fetch_one(&mut *self.tx)
            .await?
            .get("total");

        let sql = format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposit_requests {REQUEST_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_deref())
            .bind(filter.user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        let items = rows
            .iter()
            .map(deposit_from_row)
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(page_of(items, page, total))
    }

    async fn insert_withdraw(
        &mut self,
        new: &NewWithdrawRequest,
    ) -> LedgerResult<WithdrawRequest> {
        let sql = format!(
            "INSERT INTO withdraw_requests
                (user_id, amount, status, user_note, bank_name, account_number, account_holder_name)
             VALUES ($1, $2, 'PENDING', $3, $4, $5, $6)
             RETURNING {WITHDRAW_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.user_id)
            .bind(new.amount)
            .bind(new.user_note.as_deref())
            .bind(&new.destination.bank_name)
            .bind(&new.destination.account_number)
            .bind(&new.destination.account_holder_name)
            .fetch_one(&mut *self.tx)
            .await?;
        withdraw_from_row(&row)
    }

    async fn lock_withdraw(&mut self, id: RequestId) -> LedgerResult<Option<WithdrawRequest>> {
        let sql =
            format!("SELECT {WITHDRAW_COLUMNS} FROM withdraw_requests WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(withdraw_from_row).transpose()
    }

    async fn resolve_withdraw(
        &mut self,
        id: RequestId,
        resolution: &Resolution,
    ) -> LedgerResult<Option<WithdrawRequest>> {
        let sql = format!(
            "UPDATE withdraw_requests
             SET status = $2, approved_by = $3, approved_at = NOW(),
                 admin_note = $4, updated_at = NOW()
             WHERE id = $1 AND status = 'PENDING'
             RETURNING {WITHDRAW_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(resolution.status.to_string())
            .bind(resolution.admin_id)
            .bind(resolution.note.as_deref())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(withdraw_from_row).transpose()
    }

    async fn list_withdraws(
        &mut self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<WithdrawRequest>> {
        let status = filter.status.map(|s| s.to_string());

        let count_sql = format!("SELECT COUNT(*) AS total FROM withdraw_requests {REQUEST_WHERE}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(status.as_deref())
            .bind(filter.user_id)
            .fetch_one(&mut *self.tx)
            .await?
            .get("total");

        let sql = format!(
            "SELECT {WITHDRAW_COLUMNS} FROM withdraw_requests {REQUEST_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_deref())
            .bind(filter.user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        let items = rows
            .iter()
            .map(withdraw_from_row)
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(page_of(items, page, total))
    }

    async fn find_payment_info(&mut self, user_id: UserId) -> LedgerResult<Option<PaymentInfo>> {
        let sql = format!("SELECT {PAYMENT_INFO_COLUMNS} FROM payment_infos WHERE user_id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(payment_info_from_row))
    }

    async fn upsert_payment_info(
        &mut self,
        user_id: UserId,
        details: &PaymentDetails,
        qr_code_url: Option<&str>,
    ) -> LedgerResult<PaymentInfo> {
        let sql = format!(
            "INSERT INTO payment_infos
                (user_id, bank_name, account_number, account_holder_name, qr_code_url)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id)
             DO UPDATE SET
                bank_name = EXCLUDED.bank_name,
                account_number = EXCLUDED.account_number,
                account_holder_name = EXCLUDED.account_holder_name,
                qr_code_url = EXCLUDED.qr_code_url,
                updated_at = NOW()
             RETURNING {PAYMENT_INFO_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(&details.bank_name)
            .bind(&details.account_number)
            .bind(&details.account_holder_name)
            .bind(qr_code_url)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(payment_info_from_row(&row))
    }
}

#[async_trait]
impl PointsStore for PgStoreTx {
    async fn find_game(&mut self, game_id: GameId) -> LedgerResult<Option<Game>> {
        let row = sqlx::query("SELECT id, developer_id, name, support_points FROM games WHERE id = $1")
            .bind(game_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(|row| Game {
            id: row.get("id"),
            developer_id: row.get("developer_id"),
            name: row.get("name"),
            support_points: row.get("support_points"),
        }))
    }

    async fn point_award_exists(
        &mut self,
        player_id: UserId,
        game_id: GameId,
        action_type: PointActionType,
    ) -> LedgerResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(
                SELECT 1 FROM point_transactions
                WHERE player_id = $1 AND game_id = $2 AND action_type = $3
             ) AS awarded",
        )
        .bind(player_id)
        .bind(game_id)
        .bind(action_type.to_string())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.get("awarded"))
    }

    async fn insert_point_transaction(
        &mut self,
        new: &NewPointTransaction,
    ) -> LedgerResult<PointTransaction> {
        let sql = format!(
            "INSERT INTO point_transactions (player_id, game_id, action_type, points)
             VALUES ($1, $2, $3, $4)
             RETURNING {POINT_TX_COLUMNS}"
        );
        let result = sqlx::query(&sql)
            .bind(new.player_id)
            .bind(new.game_id)
            .bind(new.action_type.to_string())
            .bind(new.points)
            .fetch_one(&mut *self.tx)
            .await;

        match result {
            Ok(row) => point_tx_from_row(&row),
            Err(e) if is_unique_violation(&e) => Err(LedgerError::AlreadyAwarded {
                player_id: new.player_id,
                game_id: new.game_id,
                action: new.action_type.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn lock_or_create_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        sqlx::query(
            "INSERT INTO player_developer_points (player_id, developer_id, total_points)
             VALUES ($1, $2, 0)
             ON CONFLICT (player_id, developer_id) DO NOTHING",
        )
        .bind(player_id)
        .bind(developer_id)
        .execute(&mut *self.tx)
        .await?;

        let sql = format!(
            "SELECT {POINTS_COLUMNS} FROM player_developer_points
             WHERE player_id = $1 AND developer_id = $2
             FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(player_id)
            .bind(developer_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(points_from_row(&row))
    }

    async fn write_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
        total_points: i64,
    ) -> LedgerResult<PlayerDeveloperPoints> {
        let sql = format!(
            "UPDATE player_developer_points
             SET total_points = $3, last_updated = NOW()
             WHERE player_id = $1 AND developer_id = $2
             RETURNING {POINTS_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(player_id)
            .bind(developer_id)
            .bind(total_points)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| {
                LedgerError::not_found("Points", format!("{player_id}/{developer_id}"))
            })?;
        Ok(points_from_row(&row))
    }

    async fn find_points(
        &mut self,
        player_id: UserId,
        developer_id: UserId,
    ) -> LedgerResult<Option<PlayerDeveloperPoints>> {
        let sql = format!(
            "SELECT {POINTS_COLUMNS} FROM player_developer_points
             WHERE player_id = $1 AND developer_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(player_id)
            .bind(developer_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(points_from_row))
    }

    async fn list_points_for_player(
        &mut self,
        player_id: UserId,
    ) -> LedgerResult<Vec<PlayerDeveloperPoints>> {
        let sql = format!(
            "SELECT {POINTS_COLUMNS} FROM player_developer_points
             WHERE player_id = $1
             ORDER BY total_points DESC, developer_id"
        );
        let rows = sqlx::query(&sql)
            .bind(player_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.iter().map(points_from_row).collect())
    }

    async fn leaderboard(
        &mut self,
        developer_id: UserId,
        limit: u32,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            "SELECT p.player_id, u.email, p.total_points, p.last_updated
             FROM player_developer_points p
             JOIN users u ON u.id = p.player_id
             WHERE p.developer_id = $1
             ORDER BY p.total_points DESC, p.last_updated DESC
             LIMIT $2",
        )
        .bind(developer_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .iter()
            .zip(1u32..)
            .map(|(row, rank)| LeaderboardEntry {
                rank,
                player_id: row.get("player_id"),
                player_email: row.get("email"),
                total_points: row.get("total_points"),
                last_updated: row.get::<NaiveDateTime, _>("last_updated").and_utc(),
            })
            .collect())
    }

    async fn list_point_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<PointTransaction>> {
        let total: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM point_transactions WHERE player_id = $1")
                .bind(player_id)
                .fetch_one(&mut *self.tx)
                .await?
                .get("total");

        let sql = format!(
            "SELECT {POINT_TX_COLUMNS} FROM point_transactions
             WHERE player_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(player_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        let items = rows
            .iter()
            .map(point_tx_from_row)
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(page_of(items, page, total))
    }
}

#[async_trait]
impl GiftStore for PgStoreTx {
    async fn lock_gift(&mut self, gift_id: GiftId) -> LedgerResult<Option<Gift>> {
        let sql = format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(gift_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(gift_from_row))
    }

    async fn write_gift_quantity(&mut self, gift_id: GiftId, quantity: i64) -> LedgerResult<Gift> {
        let sql = format!(
            "UPDATE gifts SET quantity = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {GIFT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(gift_id)
            .bind(quantity)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| LedgerError::not_found("Gift", gift_id))?;
        Ok(gift_from_row(&row))
    }

    async fn insert_gift_transaction(
        &mut self,
        new: &NewGiftTransaction,
    ) -> LedgerResult<GiftTransaction> {
        let row = sqlx::query(
            "INSERT INTO gift_transactions (player_id, gift_id, points_spent)
             VALUES ($1, $2, $3)
             RETURNING id, player_id, gift_id, points_spent, created_at",
        )
        .bind(new.player_id)
        .bind(new.gift_id)
        .bind(new.points_spent)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(gift_tx_from_row(&row))
    }

    async fn list_gift_transactions(
        &mut self,
        player_id: UserId,
        page: PageRequest,
    ) -> LedgerResult<Page<GiftTransaction>> {
        let total: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM gift_transactions WHERE player_id = $1")
                .bind(player_id)
                .fetch_one(&mut *self.tx)
                .await?
                .get("total");

        let rows = sqlx::query(
            "SELECT id, player_id, gift_id, points_spent, created_at
             FROM gift_transactions
             WHERE player_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(player_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await?;

        let items = rows.iter().map(gift_tx_from_row).collect();
        Ok(page_of(items, page, total))
    }
}

const REQUEST_WHERE: &str = "WHERE ($1::VARCHAR IS NULL OR status = $1)
       AND ($2::BIGINT IS NULL OR user_id = $2)";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn page_of<T>(items: Vec<T>, page: PageRequest, total: i64) -> Page<T> {
    Page {
        items,
        page: page.page,
        size: page.size,
        total: u64::try_from(total).unwrap_or(0),
    }
}

fn timestamp(row: &PgRow, column: &str) -> chrono::DateTime<chrono::Utc> {
    row.get::<NaiveDateTime, _>(column).and_utc()
}

fn optional_timestamp(row: &PgRow, column: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    row.get::<Option<NaiveDateTime>, _>(column)
        .map(|t| t.and_utc())
}

fn user_from_row(row: &PgRow) -> LedgerResult<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        role: row.get::<String, _>("role").parse()?,
        balance: row.get("balance"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    })
}

fn escrow_from_row(row: &PgRow) -> LedgerResult<EscrowTransaction> {
    Ok(EscrowTransaction {
        id: row.get("id"),
        transaction_type: row.get::<String, _>("transaction_type").parse()?,
        amount: row.get("amount"),
        platform_fee: row.get("platform_fee"),
        seller_amount: row.get("seller_amount"),
        status: row.get::<String, _>("status").parse()?,
        buyer_id: row.get("buyer_id"),
        seller_id: row.get("seller_id"),
        asset_id: row.get("asset_id"),
        file_url: row.get("file_url"),
        approved_by: row.get("approved_by"),
        approved_at: optional_timestamp(row, "approved_at"),
        rejection_reason: row.get("rejection_reason"),
        created_at: timestamp(row, "created_at"),
    })
}

fn deposit_from_row(row: &PgRow) -> LedgerResult<DepositRequest> {
    Ok(DepositRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        status: row.get::<String, _>("status").parse()?,
        transaction_note: row.get("transaction_note"),
        admin_note: row.get("admin_note"),
        approved_by: row.get("approved_by"),
        approved_at: optional_timestamp(row, "approved_at"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    })
}

fn withdraw_from_row(row: &PgRow) -> LedgerResult<WithdrawRequest> {
    Ok(WithdrawRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        status: row.get::<String, _>("status").parse()?,
        user_note: row.get("user_note"),
        admin_note: row.get("admin_note"),
        destination: PaymentDetails {
            bank_name: row.get("bank_name"),
            account_number: row.get("account_number"),
            account_holder_name: row.get("account_holder_name"),
        },
        approved_by: row.get("approved_by"),
        approved_at: optional_timestamp(row, "approved_at"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    })
}

fn payment_info_from_row(row: &PgRow) -> PaymentInfo {
    PaymentInfo {
        id: row.get("id"),
        user_id: row.get("user_id"),
        details: PaymentDetails {
            bank_name: row.get("bank_name"),
            account_number: row.get("account_number"),
            account_holder_name: row.get("account_holder_name"),
        },
        qr_code_url: row.get("qr_code_url"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    }
}

fn points_from_row(row: &PgRow) -> PlayerDeveloperPoints {
    PlayerDeveloperPoints {
        player_id: row.get("player_id"),
        developer_id: row.get("developer_id"),
        total_points: row.get("total_points"),
        last_updated: timestamp(row, "last_updated"),
    }
}

fn point_tx_from_row(row: &PgRow) -> LedgerResult<PointTransaction> {
    Ok(PointTransaction {
        id: row.get("id"),
        player_id: row.get("player_id"),
        game_id: row.get("game_id"),
        action_type: row.get::<String, _>("action_type").parse()?,
        points: row.get("points"),
        created_at: timestamp(row, "created_at"),
    })
}

fn gift_from_row(row: &PgRow) -> Gift {
    Gift {
        id: row.get("id"),
        developer_id: row.get("developer_id"),
        name: row.get("name"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        point_cost: row.get("point_cost"),
        quantity: row.get("quantity"),
        created_at: timestamp(row, "created_at"),
    }
}

fn gift_tx_from_row(row: &PgRow) -> GiftTransaction {
    GiftTransaction {
        id: row.get("id"),
        player_id: row.get("player_id"),
        gift_id: row.get("gift_id"),
        points_spent: row.get("points_spent"),
        created_at: timestamp(row, "created_at"),
    }
}
