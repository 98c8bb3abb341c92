pub mod account_repository;
pub mod entry_repository;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod transaction_repository;

pub use account_repository::AccountRepository;
pub use entry_repository::EntryRepository;
pub use memory::{MemoryLedgerStore, MemoryLedgerTx};
pub use postgres::{IsolationLevel, PgLedgerStore, PgLedgerTx, PgStoreOptions};
pub use store::{LedgerQueries, LedgerStore, LedgerTx};
pub use transaction_repository::TransactionRepository;

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
