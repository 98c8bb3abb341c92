use crate::error::Result;
use crate::models::{Account, Entry, NewAccount, NewTransaction, Transaction};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of store transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a new store transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;
}

/// Operations scoped to one open store transaction.
///
/// Nothing written through a `LedgerTx` is visible to other transactions until
/// `commit` succeeds. Dropping an unfinished transaction rolls it back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerTx: Send {
    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction>;

    async fn insert_entry(&mut self, account_id: i64, amount: Decimal) -> Result<Entry>;

    /// Adds `delta` to the account balance, taking the row's exclusive lock for the
    /// rest of the transaction. Returns `None` if the account does not exist.
    async fn add_account_balance(&mut self, account_id: i64, delta: Decimal)
        -> Result<Option<Account>>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Single-statement reads and account administration outside any unit of work.
#[async_trait]
pub trait LedgerQueries: Send + Sync {
    async fn create_account(&self, new: &NewAccount) -> Result<Account>;

    async fn get_account(&self, id: i64) -> Result<Option<Account>>;

    async fn list_accounts(
        &self,
        owner: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>>;

    /// Removes an account that no entry or transaction references.
    /// Returns false if there was nothing to delete.
    async fn delete_account(&self, id: i64) -> Result<bool>;

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>>;

    async fn list_entries(&self, account_id: i64, limit: i64, offset: i64) -> Result<Vec<Entry>>;

    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>>;

    /// Transactions where `account_id` is the source or the destination, oldest first.
    async fn list_transactions(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>>;
}
