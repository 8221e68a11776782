//! Ledger core shared by every engine.
//!
//! This module provides:
//! - The error taxonomy ([`LedgerError`]) and shared models
//! - Balance, points and stock primitives, the only writers of those values
//! - The scoped [`UnitOfWork`] and the [`LedgerObserver`] it notifies on commit
//! - Engine configuration

pub mod balance;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod points;
pub mod stock;
pub mod unit_of_work;

pub use balance::BalanceLedger;
pub use config::LedgerConfig;
pub use errors::{LedgerError, LedgerResult};
pub use events::{LedgerEvent, LedgerObserver, LogObserver, RecordingObserver};
pub use models::{ApprovalStatus, Page, PageRequest, Resolution, Role, User, UserId};
pub use points::PointsLedger;
pub use stock::StockLedger;
pub use unit_of_work::{LedgerContext, UnitOfWork};
