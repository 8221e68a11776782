//! Escrow engine for asset purchases.
//!
//! `(none) -> PENDING -> APPROVED | REJECTED`. Creating a purchase debits
//! the buyer immediately; approval pays the seller and the platform,
//! rejection refunds the buyer in full.

use super::models::{
    AssetId, AssetType, EscrowFilter, EscrowId, EscrowTransaction, FeeSplit, NewEscrowTransaction,
    PurchasedAsset,
};
use crate::db::EscrowStore;
use crate::ledger::{
    ApprovalStatus, BalanceLedger, LedgerContext, LedgerError, LedgerEvent, LedgerResult, Page,
    PageRequest, Resolution, UnitOfWork,
};

const ENTITY: &str = "Transaction";

/// Escrow manager
#[derive(Clone)]
pub struct EscrowManager {
    ctx: LedgerContext,
}

impl EscrowManager {
    /// Create a new escrow manager
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Purchase a paid asset, holding the price in escrow
    ///
    /// # Arguments
    ///
    /// * `uow` - Open unit of work
    /// * `buyer_email` - Authenticated buyer identity
    /// * `asset_id` - Asset to purchase
    ///
    /// # Returns
    ///
    /// * `LedgerResult<EscrowTransaction>` - Pending transaction
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Asset free, not approved, owned by the
    ///   buyer, already bought, or buyer balance below the price
    pub async fn purchase_asset_in(
        &self,
        uow: &mut UnitOfWork,
        buyer_email: &str,
        asset_id: AssetId,
    ) -> LedgerResult<EscrowTransaction> {
        let result = async {
            let buyer = uow.user_by_email(buyer_email).await?;
            let asset = uow
                .store()
                .find_asset(asset_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Asset", asset_id))?;

            if asset.asset_type != AssetType::Paid {
                return Err(LedgerError::validation(format!(
                    "asset {asset_id} is free and cannot be purchased"
                )));
            }
            if asset.status != ApprovalStatus::Approved {
                return Err(LedgerError::validation(format!(
                    "asset {asset_id} is not approved for sale"
                )));
            }
            if asset.designer_id == buyer.id {
                return Err(LedgerError::validation("cannot purchase your own asset"));
            }
            if uow
                .store()
                .has_approved_purchase(buyer.id, asset_id)
                .await?
            {
                return Err(LedgerError::validation(format!(
                    "asset {asset_id} has already been purchased"
                )));
            }

            let split = FeeSplit::compute(asset.price)?;

            // Escrow hold: the buyer's row stays locked until commit
            let buyer_balance = BalanceLedger::debit(uow, buyer.id, split.amount)
                .await
                .map_err(|e| e.shortfall_as_validation("purchase"))?;

            let tx = uow
                .store()
                .insert_escrow(&NewEscrowTransaction {
                    buyer_id: buyer.id,
                    seller_id: asset.designer_id,
                    asset_id,
                    split,
                    file_url: asset.file_url,
                })
                .await?;

            log::info!(
                "Purchase {} created: buyer {} asset {} amount {} (buyer balance {})",
                tx.id,
                buyer.id,
                asset_id,
                tx.amount,
                buyer_balance
            );
            uow.record(LedgerEvent::PurchaseCreated {
                transaction_id: tx.id,
                buyer_id: tx.buyer_id,
                seller_id: tx.seller_id,
                asset_id,
                amount: tx.amount,
            });

            Ok(tx)
        }
        .await;
        uow.guard(result)
    }

    /// Purchase in its own unit of work
    pub async fn purchase_asset(
        &self,
        buyer_email: &str,
        asset_id: AssetId,
    ) -> LedgerResult<EscrowTransaction> {
        let mut uow = self.ctx.begin().await?;
        let result = self.purchase_asset_in(&mut uow, buyer_email, asset_id).await;
        uow.finish(result).await
    }

    /// Approve a pending purchase: pay the seller and the platform
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidState` - Transaction already approved or rejected
    pub async fn approve_in(
        &self,
        uow: &mut UnitOfWork,
        transaction_id: EscrowId,
        admin_email: &str,
    ) -> LedgerResult<EscrowTransaction> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            self.lock_pending(uow, transaction_id).await?;

            let platform_account_id = match &self.ctx.config().platform_account_email {
                Some(email) => uow.user_by_email(email).await?.id,
                None => admin.id,
            };

            let tx = self
                .transition(uow, transaction_id, Resolution::approve(admin.id, None))
                .await?;

            BalanceLedger::lock_in_order(uow, &[tx.seller_id, platform_account_id]).await?;
            BalanceLedger::credit(uow, tx.seller_id, tx.seller_amount).await?;
            BalanceLedger::credit(uow, platform_account_id, tx.platform_fee).await?;

            log::info!(
                "Purchase {} approved by {}: seller {} +{}, platform {} +{}",
                tx.id,
                admin.id,
                tx.seller_id,
                tx.seller_amount,
                platform_account_id,
                tx.platform_fee
            );
            uow.record(LedgerEvent::PurchaseApproved {
                transaction_id: tx.id,
                admin_id: admin.id,
                seller_id: tx.seller_id,
                seller_amount: tx.seller_amount,
                platform_account_id,
                platform_fee: tx.platform_fee,
            });

            Ok(tx)
        }
        .await;
        uow.guard(result)
    }

    /// Approve in its own unit of work
    pub async fn approve(
        &self,
        transaction_id: EscrowId,
        admin_email: &str,
    ) -> LedgerResult<EscrowTransaction> {
        let mut uow = self.ctx.begin().await?;
        let result = self.approve_in(&mut uow, transaction_id, admin_email).await;
        uow.finish(result).await
    }

    /// Reject a pending purchase and refund the buyer in full
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidState` - Transaction already approved or rejected
    pub async fn reject_in(
        &self,
        uow: &mut UnitOfWork,
        transaction_id: EscrowId,
        admin_email: &str,
        reason: Option<String>,
    ) -> LedgerResult<EscrowTransaction> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            self.lock_pending(uow, transaction_id).await?;

            let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
            let tx = self
                .transition(uow, transaction_id, Resolution::reject(admin.id, reason))
                .await?;

            BalanceLedger::credit(uow, tx.buyer_id, tx.amount).await?;

            log::info!(
                "Purchase {} rejected by {}: refunded {} to buyer {}",
                tx.id,
                admin.id,
                tx.amount,
                tx.buyer_id
            );
            uow.record(LedgerEvent::PurchaseRejected {
                transaction_id: tx.id,
                admin_id: admin.id,
                buyer_id: tx.buyer_id,
                refunded: tx.amount,
            });

            Ok(tx)
        }
        .await;
        uow.guard(result)
    }

    /// Reject in its own unit of work
    pub async fn reject(
        &self,
        transaction_id: EscrowId,
        admin_email: &str,
        reason: Option<String>,
    ) -> LedgerResult<EscrowTransaction> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .reject_in(&mut uow, transaction_id, admin_email, reason)
            .await;
        uow.finish(result).await
    }

    /// Pending purchases awaiting an admin decision
    pub async fn pending(&self, page: PageRequest) -> LedgerResult<Page<EscrowTransaction>> {
        self.list(
            EscrowFilter {
                status: Some(ApprovalStatus::Pending),
                ..Default::default()
            },
            page,
        )
        .await
    }

    /// Every purchase ever made
    pub async fn all(&self, page: PageRequest) -> LedgerResult<Page<EscrowTransaction>> {
        self.list(EscrowFilter::default(), page).await
    }

    /// Purchases made by a buyer
    pub async fn buyer_history(
        &self,
        buyer_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let buyer = uow.user_by_email(buyer_email).await?;
            let filter = EscrowFilter {
                buyer_id: Some(buyer.id),
                ..Default::default()
            };
            uow.store().list_escrows(&filter, page).await
        }
        .await;
        uow.finish(result).await
    }

    /// Sales made by a seller
    pub async fn seller_history(
        &self,
        seller_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let seller = uow.user_by_email(seller_email).await?;
            let filter = EscrowFilter {
                seller_id: Some(seller.id),
                ..Default::default()
            };
            uow.store().list_escrows(&filter, page).await
        }
        .await;
        uow.finish(result).await
    }

    /// Assets a buyer owns through approved purchases, with the file URL
    /// captured when each purchase was made
    pub async fn purchased_assets(
        &self,
        buyer_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<PurchasedAsset>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let buyer = uow.user_by_email(buyer_email).await?;
            let filter = EscrowFilter {
                status: Some(ApprovalStatus::Approved),
                buyer_id: Some(buyer.id),
                seller_id: None,
            };
            uow.store().list_escrows(&filter, page).await
        }
        .await;
        Ok(uow.finish(result).await?.map(PurchasedAsset::from))
    }

    async fn list(
        &self,
        filter: EscrowFilter,
        page: PageRequest,
    ) -> LedgerResult<Page<EscrowTransaction>> {
        let mut uow = self.ctx.begin().await?;
        let result = uow
            .store()
            .list_escrows(&filter, self.ctx.config().page(page))
            .await;
        uow.finish(result).await
    }

    /// Lock the transaction row and check it is still pending
    async fn lock_pending(
        &self,
        uow: &mut UnitOfWork,
        transaction_id: EscrowId,
    ) -> LedgerResult<EscrowTransaction> {
        let tx = uow
            .store()
            .lock_escrow(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(ENTITY, transaction_id))?;

        if !tx.status.is_pending() {
            log::warn!(
                "Transaction {} already resolved as {}",
                transaction_id,
                tx.status
            );
            return Err(already_resolved(transaction_id, tx.status));
        }
        Ok(tx)
    }

    /// Compare-and-swap the status out of PENDING
    async fn transition(
        &self,
        uow: &mut UnitOfWork,
        transaction_id: EscrowId,
        resolution: Resolution,
    ) -> LedgerResult<EscrowTransaction> {
        match uow
            .store()
            .resolve_escrow(transaction_id, &resolution)
            .await?
        {
            Some(tx) => Ok(tx),
            None => {
                let status = uow
                    .store()
                    .lock_escrow(transaction_id)
                    .await?
                    .map(|tx| tx.status)
                    .unwrap_or(resolution.status);
                Err(already_resolved(transaction_id, status))
            }
        }
    }
}

fn already_resolved(id: EscrowId, status: ApprovalStatus) -> LedgerError {
    LedgerError::InvalidState {
        entity: ENTITY,
        id,
        status,
    }
}

