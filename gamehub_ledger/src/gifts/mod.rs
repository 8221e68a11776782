//! Finite-stock gifts redeemed against reward points.

pub mod manager;
pub mod models;

pub use manager::GiftManager;
pub use models::{Gift, GiftId, GiftTransaction, NewGiftTransaction};
