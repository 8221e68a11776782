//! Balance ledger: the only code path that writes account balances.
//!
//! Every primitive locks the account row before reading the balance, so a
//! check and the write that depends on it can never interleave with another
//! unit of work touching the same account.

use super::errors::{LedgerError, LedgerResult};
use super::models::{User, UserId};
use super::unit_of_work::UnitOfWork;
use crate::db::AccountStore;

/// Credit/debit primitives on user balances
pub struct BalanceLedger;

impl BalanceLedger {
    /// Add `amount` to a user's balance
    ///
    /// # Returns
    ///
    /// * `LedgerResult<i64>` - New balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Negative amount
    /// * `LedgerError::NotFound` - Unknown user
    /// * `LedgerError::BalanceOverflow` - Balance would overflow
    pub async fn credit(uow: &mut UnitOfWork, user_id: UserId, amount: i64) -> LedgerResult<i64> {
        check_amount(amount)?;
        let user = Self::lock(uow, user_id).await?;

        let new_balance = user
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        uow.store().write_balance(user_id, new_balance).await?;
        log::debug!("Credited {} to user {} (balance {})", amount, user_id, new_balance);
        Ok(new_balance)
    }

    /// Subtract `amount` from a user's balance
    ///
    /// # Returns
    ///
    /// * `LedgerResult<i64>` - New balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - Balance lower than `amount`; nothing
    ///   is written
    pub async fn debit(uow: &mut UnitOfWork, user_id: UserId, amount: i64) -> LedgerResult<i64> {
        let user = Self::ensure_funds(uow, user_id, amount).await?;
        let new_balance = user.balance - amount;

        uow.store().write_balance(user_id, new_balance).await?;
        log::debug!("Debited {} from user {} (balance {})", amount, user_id, new_balance);
        Ok(new_balance)
    }

    /// Lock the account and check it covers `amount` without moving funds
    pub async fn ensure_funds(
        uow: &mut UnitOfWork,
        user_id: UserId,
        amount: i64,
    ) -> LedgerResult<User> {
        check_amount(amount)?;
        let user = Self::lock(uow, user_id).await?;

        if user.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                user_id,
                available: user.balance,
                required: amount,
            });
        }
        Ok(user)
    }

    /// Lock several accounts in ascending ID order.
    ///
    /// Transitions that touch more than one account take their locks through
    /// here first so two of them can never wait on each other.
    pub async fn lock_in_order(uow: &mut UnitOfWork, user_ids: &[UserId]) -> LedgerResult<()> {
        let mut ids = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        for id in ids {
            Self::lock(uow, id).await?;
        }
        Ok(())
    }

    async fn lock(uow: &mut UnitOfWork, user_id: UserId) -> LedgerResult<User> {
        uow.store()
            .lock_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("User", user_id))
    }
}

fn check_amount(amount: i64) -> LedgerResult<()> {
    if amount < 0 {
        return Err(LedgerError::validation(format!(
            "amount cannot be negative, got {amount}"
        )));
    }
    Ok(())
}
