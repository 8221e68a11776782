//! Shared fixtures for ledger integration tests.
#![allow(dead_code)]

use gamehub_ledger::db::MemoryStore;
use gamehub_ledger::ledger::{LedgerConfig, RecordingObserver, Role, User};
use gamehub_ledger::payments::PaymentDetails;
use gamehub_ledger::Ledger;
use std::sync::Arc;

pub const ADMIN: &str = "admin@gamehub.test";

/// Ledger over a fresh in-process store with one admin account
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub observer: Arc<RecordingObserver>,
    pub ledger: Ledger,
    pub admin: User,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    pub async fn with_config(config: LedgerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let observer = Arc::new(RecordingObserver::new());
        let admin = store.insert_user(ADMIN, Role::Admin, 0).await;
        let ledger = Ledger::new(store.clone(), observer.clone(), config);
        Self {
            store,
            observer,
            ledger,
            admin,
        }
    }

    pub async fn user(&self, email: &str, role: Role, balance: i64) -> User {
        self.store.insert_user(email, role, balance).await
    }

    pub async fn balance(&self, user: &User) -> i64 {
        self.store.balance(user.id).await
    }
}

pub fn bank_details() -> PaymentDetails {
    PaymentDetails {
        bank_name: "Vietcombank".to_string(),
        account_number: "0071000123456".to_string(),
        account_holder_name: "NGUYEN VAN A".to_string(),
    }
}
