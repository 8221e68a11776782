//! Stock ledger: the only code path that writes gift quantities.

use super::errors::{LedgerError, LedgerResult};
use super::unit_of_work::UnitOfWork;
use crate::db::GiftStore;
use crate::gifts::{Gift, GiftId};

/// Decrement primitive on gift stock
pub struct StockLedger;

impl StockLedger {
    /// Lock a gift row
    pub async fn lock(uow: &mut UnitOfWork, gift_id: GiftId) -> LedgerResult<Gift> {
        uow.store()
            .lock_gift(gift_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Gift", gift_id))
    }

    /// Take one unit out of stock
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Gift>` - Gift with its new quantity
    ///
    /// # Errors
    ///
    /// * `LedgerError::OutOfStock` - Quantity already zero
    pub async fn take_one(uow: &mut UnitOfWork, gift_id: GiftId) -> LedgerResult<Gift> {
        let gift = Self::lock(uow, gift_id).await?;
        if gift.quantity <= 0 {
            return Err(LedgerError::OutOfStock(gift_id));
        }
        uow.store()
            .write_gift_quantity(gift_id, gift.quantity - 1)
            .await
    }
}
