#![allow(dead_code)]

use bank_ledger::models::{Account, NewAccount};
use bank_ledger::repositories::{LedgerQueries, MemoryLedgerStore, PgLedgerStore};
use bank_ledger::services::{
    AccountService, LedgerService, TransferEngine, TransferRequest, TransferService,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Services wired over one in-memory store.
pub struct TestLedger {
    pub store: MemoryLedgerStore,
    pub engine: TransferEngine,
    pub accounts: AccountService,
    pub ledger: LedgerService,
    pub transfers: TransferService,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_store(MemoryLedgerStore::new())
    }

    pub fn with_store(store: MemoryLedgerStore) -> Self {
        let shared = Arc::new(store.clone());
        let engine = TransferEngine::new(shared.clone());
        let accounts = AccountService::new(shared.clone());
        let ledger = LedgerService::new(shared);
        let transfers = TransferService::new(accounts.clone(), engine.clone());

        Self {
            store,
            engine,
            accounts,
            ledger,
            transfers,
        }
    }

    pub async fn open(&self, owner: &str, balance: Decimal) -> Account {
        self.store
            .create_account(&NewAccount::new(owner, "USD").with_balance(balance))
            .await
            .expect("Failed to create account")
    }

    pub async fn balance(&self, account_id: i64) -> Decimal {
        self.accounts
            .find_by_id(account_id)
            .await
            .expect("Failed to load account")
            .balance
    }
}

pub fn transfer_request(from: i64, to: i64, amount: Decimal) -> TransferRequest {
    TransferRequest {
        from_account_id: from,
        to_account_id: to,
        amount,
        currency: "USD".to_string(),
        description: "test transfer".to_string(),
        fee: dec!(0.25),
    }
}

/// Connects to `DATABASE_URL` and applies the schema. Returns `None` when no
/// database is configured so Postgres tests can skip.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    PgLedgerStore::new(pool.clone())
        .migrate()
        .await
        .expect("Failed to run migrations");

    Some(pool)
}
