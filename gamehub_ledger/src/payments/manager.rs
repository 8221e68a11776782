//! Deposit and withdraw workflows.
//!
//! Both are `PENDING -> APPROVED | REJECTED` state machines resolved by an
//! admin once the off-band bank transfer has been checked. A deposit
//! credits the user on approval. A withdrawal checks the balance when it is
//! requested but only debits on approval, re-checking funds at that point.

use super::models::{
    DepositRequest, NewDepositRequest, NewWithdrawRequest, PaymentDetails, PaymentInfo,
    RequestFilter, RequestId, WithdrawRequest,
};
use crate::db::PaymentStore;
use crate::ledger::{
    ApprovalStatus, BalanceLedger, LedgerContext, LedgerError, LedgerEvent, LedgerResult, Page,
    PageRequest, Resolution, UnitOfWork,
};

const DEPOSIT: &str = "Deposit request";
const WITHDRAW: &str = "Withdraw request";

/// Payment manager
#[derive(Clone)]
pub struct PaymentManager {
    ctx: LedgerContext,
}

impl PaymentManager {
    /// Create a new payment manager
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    // ------------------------------------------------------------------
    // Deposits
    // ------------------------------------------------------------------

    /// Request a deposit; no balance changes until an admin approves
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Amount is not positive
    pub async fn create_deposit_in(
        &self,
        uow: &mut UnitOfWork,
        user_email: &str,
        amount: i64,
        transaction_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let result = async {
            check_amount(amount)?;
            let user = uow.user_by_email(user_email).await?;

            let request = uow
                .store()
                .insert_deposit(&NewDepositRequest {
                    user_id: user.id,
                    amount,
                    transaction_note: non_blank(transaction_note),
                })
                .await?;

            log::info!(
                "Deposit request {} created: user {} amount {}",
                request.id,
                user.id,
                amount
            );
            uow.record(LedgerEvent::DepositRequested {
                request_id: request.id,
                user_id: user.id,
                amount,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn create_deposit(
        &self,
        user_email: &str,
        amount: i64,
        transaction_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .create_deposit_in(&mut uow, user_email, amount, transaction_note)
            .await;
        uow.finish(result).await
    }

    /// Approve a pending deposit and credit the user
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidState` - Request already resolved
    pub async fn approve_deposit_in(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            self.lock_pending_deposit(uow, request_id).await?;

            let request = self
                .transition_deposit(
                    uow,
                    request_id,
                    Resolution::approve(admin.id, non_blank(admin_note)),
                )
                .await?;

            let balance = BalanceLedger::credit(uow, request.user_id, request.amount).await?;

            log::info!(
                "Deposit request {} approved by {}: user {} +{} (balance {})",
                request.id,
                admin.id,
                request.user_id,
                request.amount,
                balance
            );
            uow.record(LedgerEvent::DepositApproved {
                request_id: request.id,
                admin_id: admin.id,
                user_id: request.user_id,
                amount: request.amount,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn approve_deposit(
        &self,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .approve_deposit_in(&mut uow, request_id, admin_email, admin_note)
            .await;
        uow.finish(result).await
    }

    /// Reject a pending deposit; nothing was held so no balance changes
    pub async fn reject_deposit_in(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            self.lock_pending_deposit(uow, request_id).await?;

            let request = self
                .transition_deposit(
                    uow,
                    request_id,
                    Resolution::reject(admin.id, non_blank(admin_note)),
                )
                .await?;

            log::info!("Deposit request {} rejected by {}", request.id, admin.id);
            uow.record(LedgerEvent::DepositRejected {
                request_id: request.id,
                admin_id: admin.id,
                user_id: request.user_id,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn reject_deposit(
        &self,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<DepositRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .reject_deposit_in(&mut uow, request_id, admin_email, admin_note)
            .await;
        uow.finish(result).await
    }

    /// Deposits awaiting an admin decision
    pub async fn pending_deposits(&self, page: PageRequest) -> LedgerResult<Page<DepositRequest>> {
        let mut uow = self.ctx.begin().await?;
        let result = uow
            .store()
            .list_deposits(&RequestFilter::pending(), self.ctx.config().page(page))
            .await;
        uow.finish(result).await
    }

    /// A user's deposit history
    pub async fn user_deposits(
        &self,
        user_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<DepositRequest>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let user = uow.user_by_email(user_email).await?;
            uow.store()
                .list_deposits(&RequestFilter::for_user(user.id), page)
                .await
        }
        .await;
        uow.finish(result).await
    }

    // ------------------------------------------------------------------
    // Withdrawals
    // ------------------------------------------------------------------

    /// Request a withdrawal to the user's active payment destination.
    ///
    /// The balance is checked but not held.
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - Amount not positive, balance lower than
    ///   `amount`, or no payment info
    pub async fn create_withdraw_in(
        &self,
        uow: &mut UnitOfWork,
        user_email: &str,
        amount: i64,
        user_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let result = async {
            check_amount(amount)?;
            let user = uow.user_by_email(user_email).await?;

            BalanceLedger::ensure_funds(uow, user.id, amount)
                .await
                .map_err(|e| e.shortfall_as_validation("withdrawal"))?;

            let info = uow
                .store()
                .find_payment_info(user.id)
                .await?
                .ok_or_else(|| {
                    LedgerError::validation("payment information is required for withdrawal")
                })?;

            let request = uow
                .store()
                .insert_withdraw(&NewWithdrawRequest {
                    user_id: user.id,
                    amount,
                    user_note: non_blank(user_note),
                    destination: info.details,
                })
                .await?;

            log::info!(
                "Withdraw request {} created: user {} amount {}",
                request.id,
                user.id,
                amount
            );
            uow.record(LedgerEvent::WithdrawRequested {
                request_id: request.id,
                user_id: user.id,
                amount,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn create_withdraw(
        &self,
        user_email: &str,
        amount: i64,
        user_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .create_withdraw_in(&mut uow, user_email, amount, user_note)
            .await;
        uow.finish(result).await
    }

    /// Approve a pending withdrawal and debit the user.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - Balance dropped below the amount
    ///   since the request was made; the request stays pending
    /// * `LedgerError::InvalidState` - Request already resolved
    pub async fn approve_withdraw_in(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            let pending = self.lock_pending_withdraw(uow, request_id).await?;

            let balance = match BalanceLedger::debit(uow, pending.user_id, pending.amount).await {
                Ok(balance) => balance,
                Err(e) => {
                    log::warn!(
                        "Withdraw request {} left pending: {}",
                        request_id,
                        e
                    );
                    return Err(e);
                }
            };

            let request = self
                .transition_withdraw(
                    uow,
                    request_id,
                    Resolution::approve(admin.id, non_blank(admin_note)),
                )
                .await?;

            log::info!(
                "Withdraw request {} approved by {}: user {} -{} (balance {})",
                request.id,
                admin.id,
                request.user_id,
                request.amount,
                balance
            );
            uow.record(LedgerEvent::WithdrawApproved {
                request_id: request.id,
                admin_id: admin.id,
                user_id: request.user_id,
                amount: request.amount,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn approve_withdraw(
        &self,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .approve_withdraw_in(&mut uow, request_id, admin_email, admin_note)
            .await;
        uow.finish(result).await
    }

    /// Reject a pending withdrawal; no balance changes
    pub async fn reject_withdraw_in(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let result = async {
            let admin = uow.admin_by_email(admin_email).await?;
            self.lock_pending_withdraw(uow, request_id).await?;

            let request = self
                .transition_withdraw(
                    uow,
                    request_id,
                    Resolution::reject(admin.id, non_blank(admin_note)),
                )
                .await?;

            log::info!("Withdraw request {} rejected by {}", request.id, admin.id);
            uow.record(LedgerEvent::WithdrawRejected {
                request_id: request.id,
                admin_id: admin.id,
                user_id: request.user_id,
            });
            Ok(request)
        }
        .await;
        uow.guard(result)
    }

    pub async fn reject_withdraw(
        &self,
        request_id: RequestId,
        admin_email: &str,
        admin_note: Option<String>,
    ) -> LedgerResult<WithdrawRequest> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .reject_withdraw_in(&mut uow, request_id, admin_email, admin_note)
            .await;
        uow.finish(result).await
    }

    /// Withdrawals awaiting an admin decision
    pub async fn pending_withdrawals(
        &self,
        page: PageRequest,
    ) -> LedgerResult<Page<WithdrawRequest>> {
        let mut uow = self.ctx.begin().await?;
        let result = uow
            .store()
            .list_withdraws(&RequestFilter::pending(), self.ctx.config().page(page))
            .await;
        uow.finish(result).await
    }

    /// A user's withdrawal history
    pub async fn user_withdrawals(
        &self,
        user_email: &str,
        page: PageRequest,
    ) -> LedgerResult<Page<WithdrawRequest>> {
        let mut uow = self.ctx.begin().await?;
        let page = self.ctx.config().page(page);
        let result = async {
            let user = uow.user_by_email(user_email).await?;
            uow.store()
                .list_withdraws(&RequestFilter::for_user(user.id), page)
                .await
        }
        .await;
        uow.finish(result).await
    }

    // ------------------------------------------------------------------
    // Payment destinations
    // ------------------------------------------------------------------

    /// Set the user's active payment destination, replacing any previous one
    ///
    /// # Errors
    ///
    /// * `LedgerError::Validation` - A required field is blank
    pub async fn upsert_payment_info_in(
        &self,
        uow: &mut UnitOfWork,
        user_email: &str,
        details: PaymentDetails,
        qr_code_url: Option<String>,
    ) -> LedgerResult<PaymentInfo> {
        let result = async {
            let missing = details.missing_fields();
            if !missing.is_empty() {
                return Err(LedgerError::validation(format!(
                    "payment information is missing {}",
                    missing.join(", ")
                )));
            }

            let user = uow.user_by_email(user_email).await?;
            let qr_code_url = non_blank(qr_code_url);
            let info = uow
                .store()
                .upsert_payment_info(user.id, &details, qr_code_url.as_deref())
                .await?;

            uow.record(LedgerEvent::PaymentInfoUpdated {
                user_id: user.id,
                payment_info_id: info.id,
            });
            Ok(info)
        }
        .await;
        uow.guard(result)
    }

    pub async fn upsert_payment_info(
        &self,
        user_email: &str,
        details: PaymentDetails,
        qr_code_url: Option<String>,
    ) -> LedgerResult<PaymentInfo> {
        let mut uow = self.ctx.begin().await?;
        let result = self
            .upsert_payment_info_in(&mut uow, user_email, details, qr_code_url)
            .await;
        uow.finish(result).await
    }

    /// The user's active payment destination, if any
    pub async fn payment_info(&self, user_email: &str) -> LedgerResult<Option<PaymentInfo>> {
        let mut uow = self.ctx.begin().await?;
        let result = async {
            let user = uow.user_by_email(user_email).await?;
            uow.store().find_payment_info(user.id).await
        }
        .await;
        uow.finish(result).await
    }

    // ------------------------------------------------------------------
    // Status guards
    // ------------------------------------------------------------------

    async fn lock_pending_deposit(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
    ) -> LedgerResult<DepositRequest> {
        let request = uow
            .store()
            .lock_deposit(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(DEPOSIT, request_id))?;
        ensure_pending(DEPOSIT, request_id, request.status)?;
        Ok(request)
    }

    async fn transition_deposit(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        resolution: Resolution,
    ) -> LedgerResult<DepositRequest> {
        match uow.store().resolve_deposit(request_id, &resolution).await? {
            Some(request) => Ok(request),
            None => {
                let status = uow
                    .store()
                    .lock_deposit(request_id)
                    .await?
                    .map(|r| r.status)
                    .unwrap_or(resolution.status);
                Err(already_resolved(DEPOSIT, request_id, status))
            }
        }
    }

    async fn lock_pending_withdraw(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
    ) -> LedgerResult<WithdrawRequest> {
        let request = uow
            .store()
            .lock_withdraw(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(WITHDRAW, request_id))?;
        ensure_pending(WITHDRAW, request_id, request.status)?;
        Ok(request)
    }

    async fn transition_withdraw(
        &self,
        uow: &mut UnitOfWork,
        request_id: RequestId,
        resolution: Resolution,
    ) -> LedgerResult<WithdrawRequest> {
        match uow.store().resolve_withdraw(request_id, &resolution).await? {
            Some(request) => Ok(request),
            None => {
                let status = uow
                    .store()
                    .lock_withdraw(request_id)
                    .await?
                    .map(|r| r.status)
                    .unwrap_or(resolution.status);
                Err(already_resolved(WITHDRAW, request_id, status))
            }
        }
    }
}

fn ensure_pending(entity: &'static str, id: RequestId, status: ApprovalStatus) -> LedgerResult<()> {
    if status.is_pending() {
        return Ok(());
    }
    log::warn!("{} {} already resolved as {}", entity, id, status);
    Err(already_resolved(entity, id, status))
}

fn already_resolved(entity: &'static str, id: RequestId, status: ApprovalStatus) -> LedgerError {
    LedgerError::InvalidState { entity, id, status }
}

fn check_amount(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
