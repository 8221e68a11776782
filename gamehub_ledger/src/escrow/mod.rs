//! Escrow engine for asset purchases.
//!
//! This module implements:
//! - Escrow hold: the buyer is debited when the purchase is created
//! - Platform fee split (10%, rounded half-up) paid out on approval
//! - Full refund on rejection
//! - Idempotent approve/reject guarded by the PENDING status
//!
//! ## Example
//!
//! ```no_run
//! use gamehub_ledger::Ledger;
//!
//! # async fn example(ledger: &Ledger) -> gamehub_ledger::ledger::LedgerResult<()> {
//! let purchase = ledger.escrow().purchase_asset("dev@example.com", 7).await?;
//! ledger.escrow().approve(purchase.id, "admin@example.com").await?;
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod models;

pub use manager::EscrowManager;
pub use models::{
    Asset, AssetId, AssetType, EscrowFilter, EscrowId, EscrowTransaction, FeeSplit,
    NewEscrowTransaction, PLATFORM_FEE_PERCENT, PurchasedAsset, TransactionType,
};
