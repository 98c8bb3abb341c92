pub mod account_service;
pub mod balance_service;
pub mod ledger_service;
pub mod transfer_engine;
pub mod transfer_service;
pub mod unit_of_work;

pub use account_service::{AccountService, CreateAccountRequest};
pub use balance_service::apply_delta;
pub use ledger_service::LedgerService;
pub use transfer_engine::{TransferEngine, TransferRequest, TransferResult};
pub use transfer_service::TransferService;
pub use unit_of_work::{PostCommitHook, TxFuture, UnitOfWork};
