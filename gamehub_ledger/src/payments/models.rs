//! Deposit and withdraw request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{ApprovalStatus, UserId};

/// Deposit/withdraw request ID type
pub type RequestId = i64;

/// Request to credit funds that arrive out-of-band (e.g. bank transfer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub amount: i64,
    pub status: ApprovalStatus,
    pub transaction_note: Option<String>,
    pub admin_note: Option<String>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to pay out funds to the user's bank destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub amount: i64,
    pub status: ApprovalStatus,
    pub user_note: Option<String>,
    pub admin_note: Option<String>,
    /// Payment destination snapshotted at creation time
    pub destination: PaymentDetails,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new deposit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDepositRequest {
    pub user_id: UserId,
    pub amount: i64,
    pub transaction_note: Option<String>,
}

/// Insert payload for a new withdraw request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawRequest {
    pub user_id: UserId,
    pub amount: i64,
    pub user_note: Option<String>,
    pub destination: PaymentDetails,
}

/// Bank destination details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder_name: String,
}

impl PaymentDetails {
    /// Names of the fields left blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bank_name.trim().is_empty() {
            missing.push("bank_name");
        }
        if self.account_number.trim().is_empty() {
            missing.push("account_number");
        }
        if self.account_holder_name.trim().is_empty() {
            missing.push("account_holder_name");
        }
        missing
    }
}

/// A user's active payment destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub id: i64,
    pub user_id: UserId,
    pub details: PaymentDetails,
    pub qr_code_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing filter for deposit and withdraw requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<ApprovalStatus>,
    pub user_id: Option<UserId>,
}

impl RequestFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(ApprovalStatus::Pending),
            user_id: None,
        }
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self {
            status: None,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, status: ApprovalStatus, user_id: UserId) -> bool {
        self.status.is_none_or(|s| s == status) && self.user_id.is_none_or(|u| u == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields() {
        let details = PaymentDetails {
            bank_name: "VCB".to_string(),
            account_number: "  ".to_string(),
            account_holder_name: String::new(),
        };
        assert_eq!(
            details.missing_fields(),
            vec!["account_number", "account_holder_name"]
        );
    }

    #[test]
    fn test_request_filter() {
        assert!(RequestFilter::pending().matches(ApprovalStatus::Pending, 3));
        assert!(!RequestFilter::pending().matches(ApprovalStatus::Approved, 3));
        assert!(RequestFilter::for_user(3).matches(ApprovalStatus::Rejected, 3));
        assert!(!RequestFilter::for_user(3).matches(ApprovalStatus::Pending, 4));
    }
}
