//! Scoped unit of work.
//!
//! The caller opens a [`UnitOfWork`], passes it into engine operations and
//! then commits or rolls it back. Dropping an open unit of work without
//! committing discards every write it made.
//!
//! ## Example
//!
//! ```no_run
//! use gamehub_ledger::Ledger;
//!
//! # async fn example(ledger: &Ledger) -> gamehub_ledger::ledger::LedgerResult<()> {
//! let mut uow = ledger.context().begin().await?;
//! let result = ledger
//!     .escrow()
//!     .purchase_asset_in(&mut uow, "dev@example.com", 42)
//!     .await;
//! let purchase = uow.finish(result).await?;
//! println!("purchase {} is {}", purchase.id, purchase.status);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use super::config::LedgerConfig;
use super::errors::{LedgerError, LedgerResult};
use super::events::{LedgerEvent, LedgerObserver};
use super::models::{Role, User};
use crate::db::{AccountStore, LedgerStore, StoreTx};

/// Everything an engine needs to open units of work
#[derive(Clone)]
pub struct LedgerContext {
    store: Arc<dyn LedgerStore>,
    observer: Arc<dyn LedgerObserver>,
    config: LedgerConfig,
}

impl LedgerContext {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        observer: Arc<dyn LedgerObserver>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            observer,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Open a new unit of work
    pub async fn begin(&self) -> LedgerResult<UnitOfWork> {
        let tx = self.store.begin().await?;
        Ok(UnitOfWork {
            tx,
            events: Vec::new(),
            observer: self.observer.clone(),
            failed: false,
        })
    }
}

/// An open storage transaction plus the events it will publish on commit.
///
/// Once an engine operation fails inside it, the unit of work can only be
/// rolled back: [`UnitOfWork::commit`] discards it and returns
/// [`LedgerError::Aborted`].
pub struct UnitOfWork {
    tx: Box<dyn StoreTx>,
    events: Vec<LedgerEvent>,
    observer: Arc<dyn LedgerObserver>,
    failed: bool,
}

impl UnitOfWork {
    /// Raw store access, reserved to the ledger primitives and engines
    pub(crate) fn store(&mut self) -> &mut dyn StoreTx {
        self.tx.as_mut()
    }

    /// Queue an event for publication once this unit of work commits
    pub(crate) fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Resolve an authenticated identity to its user row
    pub(crate) async fn user_by_email(&mut self, email: &str) -> LedgerResult<User> {
        self.tx
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| LedgerError::not_found("User", email))
    }

    /// Resolve an identity that must carry the admin role
    pub(crate) async fn admin_by_email(&mut self, email: &str) -> LedgerResult<User> {
        let user = self.user_by_email(email).await?;
        if user.role != Role::Admin {
            log::warn!("Rejected admin action by non-admin user {}", user.id);
            return Err(LedgerError::validation(format!(
                "{email} is not an administrator"
            )));
        }
        Ok(user)
    }

    /// Pass an engine result through, poisoning the unit of work on error
    pub(crate) fn guard<T>(&mut self, result: LedgerResult<T>) -> LedgerResult<T> {
        if let Err(e) = &result {
            if !self.failed {
                log::debug!("Unit of work marked failed: {}", e);
            }
            self.failed = true;
        }
        result
    }

    /// Whether an operation inside this unit of work has failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Number of events waiting for commit
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Commit all writes, then notify the observer of each recorded event.
    ///
    /// # Errors
    ///
    /// * `LedgerError::Aborted` - An operation failed earlier; everything
    ///   was rolled back instead
    pub async fn commit(self) -> LedgerResult<()> {
        if self.failed {
            log::warn!(
                "Commit refused after a failed operation; discarding {} event(s)",
                self.events.len()
            );
            self.tx.rollback().await?;
            return Err(LedgerError::Aborted);
        }

        let UnitOfWork {
            tx,
            events,
            observer,
            ..
        } = self;

        tx.commit().await?;

        for event in &events {
            observer.on_committed(event);
        }
        Ok(())
    }

    /// Discard all writes and recorded events
    pub async fn rollback(self) -> LedgerResult<()> {
        if !self.events.is_empty() {
            log::debug!("Discarding {} uncommitted ledger event(s)", self.events.len());
        }
        self.tx.rollback().await
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// The original error is returned even if the rollback itself fails.
    pub async fn finish<T>(self, result: LedgerResult<T>) -> LedgerResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    log::error!("Rollback failed after '{}': {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }
}
