use crate::error::{AppError, Result};
use crate::models::{Account, Entry, NewAccount, NewTransaction, Transaction};
use crate::repositories::store::{LedgerQueries, LedgerStore, LedgerTx};
use crate::repositories::{AccountRepository, EntryRepository, TransactionRepository};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres};
use std::time::Duration;

/// Transaction isolation level requested at `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Per-transaction session settings.
#[derive(Debug, Clone, Default)]
pub struct PgStoreOptions {
    pub isolation_level: IsolationLevel,
    /// Upper bound on waiting for a row lock; `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    options: PgStoreOptions,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            options: PgStoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PgStoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled schema.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // Must run before any other statement in the transaction.
        if self.options.isolation_level != IsolationLevel::ReadCommitted {
            let sql = format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                self.options.isolation_level.as_sql()
            );
            sqlx::query(&sql).execute(&mut *tx).await?;
        }

        if let Some(timeout) = self.options.lock_timeout {
            let sql = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis());
            sqlx::query(&sql).execute(&mut *tx).await?;
        }

        Ok(Box::new(PgLedgerTx { tx: Some(tx) }))
    }
}

/// An open PostgreSQL transaction. Dropped without commit, sqlx rolls it back.
pub struct PgLedgerTx {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgLedgerTx {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Store("transaction already finished".to_string()))
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction> {
        TransactionRepository::create(self.conn()?, new).await
    }

    async fn insert_entry(&mut self, account_id: i64, amount: Decimal) -> Result<Entry> {
        EntryRepository::create(self.conn()?, account_id, amount).await
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: Decimal,
    ) -> Result<Option<Account>> {
        AccountRepository::add_balance(self.conn()?, account_id, delta).await
    }

    async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Store("transaction already finished".to_string())),
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Err(AppError::Store("transaction already finished".to_string())),
        }
    }
}

#[async_trait]
impl LedgerQueries for PgLedgerStore {
    async fn create_account(&self, new: &NewAccount) -> Result<Account> {
        AccountRepository::create(&self.pool, new).await
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        AccountRepository::find_by_id(&self.pool, id).await
    }

    async fn list_accounts(
        &self,
        owner: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>> {
        AccountRepository::list(&self.pool, owner.as_deref(), limit, offset).await
    }

    async fn delete_account(&self, id: i64) -> Result<bool> {
        AccountRepository::delete(&self.pool, id).await
    }

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        EntryRepository::find_by_id(&self.pool, id).await
    }

    async fn list_entries(&self, account_id: i64, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        EntryRepository::find_by_account(&self.pool, account_id, limit, offset).await
    }

    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        TransactionRepository::find_by_id(&self.pool, id).await
    }

    async fn list_transactions(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        TransactionRepository::find_by_account(&self.pool, account_id, limit, offset).await
    }
}
