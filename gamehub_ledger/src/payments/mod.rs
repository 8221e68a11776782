//! Deposit and withdraw workflows, pending manual admin confirmation
//! against an off-band payment rail.

pub mod manager;
pub mod models;

pub use manager::PaymentManager;
pub use models::{
    DepositRequest, NewDepositRequest, NewWithdrawRequest, PaymentDetails, PaymentInfo,
    RequestFilter, RequestId, WithdrawRequest,
};
