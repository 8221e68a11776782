//! Gift redemption engine.

use super::models::{GiftId, GiftTransaction, NewGiftTransaction};
use crate::db::GiftStore;
use crate::ledger::{
    LedgerContext, LedgerError, LedgerEvent, LedgerResult, Page, PageRequest, PointsLedger,
    StockLedger, UnitOfWork,
};

/// Gift manager
#[derive(Clone)]
pub struct GiftManager {
    ctx: LedgerContext,
}

impl GiftManager {
    /// Create a new gift manager
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Redeem a gift with points earned from its developer.
    ///
    /// Spends the gift's current cost, takes one unit of stock and records
    /// the redemption. Either all three happen or none does.
    ///
    /// # Errors
    ///
    /// * `LedgerError::OutOfStock` - No units left
    /// * `LedgerError::InsufficientPoints` - Player holds fewer points with
    ///   the developer than the gift costs
    pub async fn redeem_in(
        &self,
        uow: &mut UnitOfWork,
        player_email: &str,
        gift_id: GiftId,
    ) -> LedgerResult<GiftTransaction> {
        let result = async {
            let player = uow.user_by_email(player_email).await?;
            let gift = StockLedger::lock(uow, gift_id).await?;

            if gift.quantity <= 0 {
                log::info!("Gift {} is out of stock", gift_id);
                return Err(LedgerError::OutOfStock(gift_id));
            }

            let points =
                PointsLedger::spend(uow, player.id, gift.developer_id, gift.point_cost).await?;
            let gift = StockLedger::take_one(uow, gift_id).await?;

            let record = uow
                .store()
                .insert_gift_transaction(&NewGiftTransaction {
                    player_id: player.id,
                    gift_id,
                    points_spent: gift.point_cost,
                })
                .await?;

            log::info!(
                "Player {} redeemed gift {} for {} points ({} left, {} in stock)",
                player.id,
                gift_id,
                record.points_spent,
                points.total_points,
                gift.quantity
            );
            uow.record(LedgerEvent::GiftRedeemed {
                transaction_id: record.id,
                player_id: player.id,
                gift_id,
                points_spent: record.points_spent,
                remaining_points: points.total_points,
                remaining_stock: gift.quantity,
            });

            Ok(record)
        }
        .await;
        uow.guard(result)
    }

    /// Redeem in its own unit of work
    pub async fn redeem(&self, player_email: &str, gift_id: GiftId) -> LedgerResult<GiftTransaction> {
        let mut uow = self.ctx.begin().await?;
        let result = self.redeem_in(&mut uow, player_email, gift_id).await;
        uow.finish(result).await
    }

    /// A player's redemptions, newest first
    pub async fn history(
        &self,
        player_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<GiftTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let player = uow.user_by_email(player_email).await?;
            uow.store().list_gift_transactions(player.id, page).await
        }
        .await;
        uow.finish(result).await
    }
}
