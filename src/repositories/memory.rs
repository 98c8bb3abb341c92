use crate::error::{AppError, Result};
use crate::models::money::CURRENCY_CODE_LEN;
use crate::models::{fits_amount_column, Account, Entry, NewAccount, NewTransaction, Transaction};
use crate::repositories::store::{LedgerQueries, LedgerStore, LedgerTx};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transactions: BTreeMap<i64, Transaction>,
    account_seq: i64,
    entry_seq: i64,
    transaction_seq: i64,
}

impl Tables {
    fn is_referenced(&self, account_id: i64) -> bool {
        self.entries.values().any(|e| e.account_id == account_id)
            || self.transactions.values().any(|t| t.involves(account_id))
    }
}

struct Shared {
    tables: RwLock<Tables>,
    row_locks: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl Shared {
    async fn lock_row(&self, account_id: i64) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(account_id).or_default().clone()
        };

        match tokio::time::timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                self.prune_row(account_id);
                Err(AppError::Serialization(format!(
                    "lock timeout waiting for account {}",
                    account_id
                )))
            }
        }
    }

    fn unlock_row(&self, account_id: i64, guard: OwnedMutexGuard<()>) {
        drop(guard);
        self.prune_row(account_id);
    }

    /// Drops the lock slot for `account_id` once nobody holds or waits on it.
    fn prune_row(&self, account_id: i64) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&account_id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&account_id);
        }
    }

    fn row_lock_count(&self) -> usize {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Mirrors the SQLSTATE 22003 rejection of a value a `NUMERIC(20, 8)` column
/// cannot hold.
fn numeric_out_of_range(column: &str, value: &Decimal) -> AppError {
    AppError::Conflict(format!(
        "numeric field overflow: {} value {} does not fit NUMERIC(20, 8)",
        column, value
    ))
}

fn check_amount_column(column: &str, value: &Decimal) -> Result<()> {
    if fits_amount_column(value) {
        Ok(())
    } else {
        Err(numeric_out_of_range(column, value))
    }
}

fn check_currency_column(currency: &str) -> Result<()> {
    if currency.len() > CURRENCY_CODE_LEN {
        return Err(AppError::Conflict(format!(
            "value too long for type character varying(3): '{}'",
            currency
        )));
    }
    Ok(())
}

/// In-memory ledger store with row-level locking.
///
/// Balance updates take an exclusive per-account lock held until commit or
/// rollback, and writes stay private to the transaction until commit. The
/// store enforces the same constraints as the SQL schema: positive transfer
/// amount and fee, non-negative balances, and references to existing accounts.
#[derive(Clone)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a store whose row-lock waits fail after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: StdMutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }

    /// Number of committed entries across all accounts.
    pub async fn entry_count(&self) -> usize {
        self.shared.tables.read().await.entries.len()
    }

    /// Number of committed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.shared.tables.read().await.transactions.len()
    }

    /// Number of accounts with a row lock slot allocated.
    pub fn row_lock_count(&self) -> usize {
        self.shared.row_lock_count()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryLedgerTx {
            shared: Arc::clone(&self.shared),
            row_guards: HashMap::new(),
            accounts: HashMap::new(),
            entries: Vec::new(),
            transactions: Vec::new(),
            finished: false,
        }))
    }
}

/// An open in-memory transaction. Dropping it discards staged writes and
/// releases its row locks.
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    row_guards: HashMap<i64, OwnedMutexGuard<()>>,
    accounts: HashMap<i64, Account>,
    entries: Vec<Entry>,
    transactions: Vec<Transaction>,
    finished: bool,
}

impl MemoryLedgerTx {
    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(AppError::Store("transaction already finished".to_string()));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.finished = true;
        self.accounts.clear();
        self.entries.clear();
        self.transactions.clear();
        for (account_id, guard) in self.row_guards.drain() {
            self.shared.unlock_row(account_id, guard);
        }
    }
}

impl Drop for MemoryLedgerTx {
    fn drop(&mut self) {
        self.release();
    }
}

fn foreign_key_violation(table: &str, account_id: i64) -> AppError {
    AppError::Conflict(format!(
        "insert on table \"{}\" violates foreign key: account {} does not exist",
        table, account_id
    ))
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn insert_transaction(&mut self, new: &NewTransaction) -> Result<Transaction> {
        self.ensure_open()?;

        if new.amount <= Decimal::ZERO {
            return Err(AppError::Conflict(
                "transactions_amount_check: amount must be positive".to_string(),
            ));
        }
        if new.fee <= Decimal::ZERO {
            return Err(AppError::Conflict(
                "transactions_fee_check: fee must be positive".to_string(),
            ));
        }
        check_amount_column("amount", &new.amount)?;
        check_amount_column("fee", &new.fee)?;
        check_currency_column(&new.currency)?;

        let mut tables = self.shared.tables.write().await;
        for account_id in [new.from_account_id, new.to_account_id] {
            if !tables.accounts.contains_key(&account_id) {
                return Err(foreign_key_violation("transactions", account_id));
            }
        }

        tables.transaction_seq += 1;
        let transaction = Transaction {
            id: tables.transaction_seq,
            from_account_id: new.from_account_id,
            to_account_id: new.to_account_id,
            amount: new.amount,
            fee: new.fee,
            currency: new.currency.clone(),
            description: new.description.clone(),
            created_at: Utc::now(),
        };
        drop(tables);

        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn insert_entry(&mut self, account_id: i64, amount: Decimal) -> Result<Entry> {
        self.ensure_open()?;
        check_amount_column("amount", &amount)?;

        let mut tables = self.shared.tables.write().await;
        if !tables.accounts.contains_key(&account_id) {
            return Err(foreign_key_violation("entries", account_id));
        }

        tables.entry_seq += 1;
        let entry = Entry {
            id: tables.entry_seq,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        drop(tables);

        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: i64,
        delta: Decimal,
    ) -> Result<Option<Account>> {
        self.ensure_open()?;

        if !self.row_guards.contains_key(&account_id) {
            let guard = self.shared.lock_row(account_id).await?;
            self.row_guards.insert(account_id, guard);
        }

        let current = match self.accounts.get(&account_id) {
            Some(staged) => Some(staged.clone()),
            None => self.shared.tables.read().await.accounts.get(&account_id).cloned(),
        };

        let Some(mut account) = current else {
            if let Some(guard) = self.row_guards.remove(&account_id) {
                self.shared.unlock_row(account_id, guard);
            }
            return Ok(None);
        };

        let balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| numeric_out_of_range("balance", &account.balance))?;
        check_amount_column("balance", &balance)?;
        if balance < Decimal::ZERO {
            return Err(AppError::Conflict(format!(
                "accounts_balance_check: balance of account {} would become {}",
                account_id, balance
            )));
        }

        account.balance = balance;
        self.accounts.insert(account_id, account.clone());
        Ok(Some(account))
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;

        {
            let mut tables = self.shared.tables.write().await;

            // Accounts may have been deleted since the rows were staged.
            for entry in &self.entries {
                if !tables.accounts.contains_key(&entry.account_id) {
                    return Err(foreign_key_violation("entries", entry.account_id));
                }
            }
            for transaction in &self.transactions {
                for account_id in [transaction.from_account_id, transaction.to_account_id] {
                    if !tables.accounts.contains_key(&account_id) {
                        return Err(foreign_key_violation("transactions", account_id));
                    }
                }
            }

            for (id, account) in self.accounts.drain() {
                if let Some(row) = tables.accounts.get_mut(&id) {
                    row.balance = account.balance;
                }
            }
            for entry in self.entries.drain(..) {
                tables.entries.insert(entry.id, entry);
            }
            for transaction in self.transactions.drain(..) {
                tables.transactions.insert(transaction.id, transaction);
            }
        }

        self.release();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.release();
        Ok(())
    }
}

fn page<T>(rows: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl LedgerQueries for MemoryLedgerStore {
    async fn create_account(&self, new: &NewAccount) -> Result<Account> {
        if new.balance < Decimal::ZERO {
            return Err(AppError::Conflict(
                "accounts_balance_check: balance must not be negative".to_string(),
            ));
        }
        check_amount_column("balance", &new.balance)?;
        check_currency_column(&new.currency)?;

        let mut tables = self.shared.tables.write().await;
        tables.account_seq += 1;
        let account = Account {
            id: tables.account_seq,
            owner: new.owner.clone(),
            balance: new.balance,
            currency: new.currency.clone(),
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.shared.tables.read().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(
        &self,
        owner: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>> {
        let tables = self.shared.tables.read().await;
        let rows = tables
            .accounts
            .values()
            .filter(|a| owner.as_deref().map_or(true, |o| a.owner == o))
            .cloned();
        Ok(page(rows, limit, offset))
    }

    async fn delete_account(&self, id: i64) -> Result<bool> {
        let guard = self.shared.lock_row(id).await?;

        let outcome = {
            let mut tables = self.shared.tables.write().await;
            if !tables.accounts.contains_key(&id) {
                Ok(false)
            } else if tables.is_referenced(id) {
                Err(AppError::Conflict(format!(
                    "account {} is still referenced by ledger history",
                    id
                )))
            } else {
                tables.accounts.remove(&id);
                Ok(true)
            }
        };

        self.shared.unlock_row(id, guard);
        outcome
    }

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        Ok(self.shared.tables.read().await.entries.get(&id).cloned())
    }

    async fn list_entries(&self, account_id: i64, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        let tables = self.shared.tables.read().await;
        let rows = tables
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned();
        Ok(page(rows, limit, offset))
    }

    async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        Ok(self.shared.tables.read().await.transactions.get(&id).cloned())
    }

    async fn list_transactions(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let tables = self.shared.tables.read().await;
        let rows = tables
            .transactions
            .values()
            .filter(|t| t.involves(account_id))
            .cloned();
        Ok(page(rows, limit, offset))
    }
}
