pub mod account;
pub mod currency;
pub mod entry;
pub mod money;
pub mod page;
pub mod transaction;

pub use account::{Account, NewAccount};
pub use currency::Currency;
pub use entry::{entries_balance, Entry};
pub use money::{amount_limit, fits_amount_column};
pub use page::Page;
pub use transaction::{NewTransaction, Transaction};
