use crate::error::{AppError, Result};
use crate::models::{fits_amount_column, Account, Currency, NewAccount, Page};
use crate::observability::mask_sensitive;
use crate::repositories::LedgerQueries;
use crate::services::transfer_engine::TransferRequest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Request to open a new account.
#[derive(Debug, Clone)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub currency: String,
    pub initial_balance: Option<Decimal>,
}

/// Service for account management operations.
#[derive(Clone)]
pub struct AccountService {
    queries: Arc<dyn LedgerQueries>,
}

impl AccountService {
    pub fn new(queries: Arc<dyn LedgerQueries>) -> Self {
        Self { queries }
    }

    /// Opens a new account with validation.
    pub async fn open_account(&self, request: CreateAccountRequest) -> Result<Account> {
        if request.owner.trim().is_empty() {
            return Err(AppError::Validation("Owner cannot be empty".to_string()));
        }

        if !Currency::is_supported(&request.currency) {
            return Err(AppError::Validation(format!(
                "Unsupported currency '{}'",
                request.currency
            )));
        }

        let balance = request.initial_balance.unwrap_or(Decimal::ZERO);
        if balance < Decimal::ZERO {
            return Err(AppError::Validation(
                "Initial balance cannot be negative".to_string(),
            ));
        }

        if !fits_amount_column(&balance) {
            return Err(AppError::Validation(
                "Initial balance must have at most 8 decimal places and be below 10^12"
                    .to_string(),
            ));
        }

        let account = self
            .queries
            .create_account(&NewAccount::new(request.owner, request.currency).with_balance(balance))
            .await?;

        info!(
            account_id = account.id,
            owner = %mask_sensitive(&account.owner, 2),
            currency = %account.currency,
            "account opened"
        );
        Ok(account)
    }

    /// Finds an account by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Account> {
        self.queries
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", id)))
    }

    /// Lists accounts, optionally for one owner, in id order.
    pub async fn list_accounts(&self, owner: Option<&str>, page: Page) -> Result<Vec<Account>> {
        page.validate()?;
        self.queries
            .list_accounts(owner.map(str::to_string), page.limit(), page.offset())
            .await
    }

    /// Deletes an account that has no ledger history.
    ///
    /// Accounts referenced by entries or transactions are kept and the call
    /// fails with `Conflict`.
    pub async fn delete_account(&self, id: i64) -> Result<()> {
        if !self.queries.delete_account(id).await? {
            return Err(AppError::NotFound(format!("Account '{}' not found", id)));
        }

        info!(account_id = id, "account deleted");
        Ok(())
    }

    /// Checks that both accounts exist, hold the request currency, and that
    /// the source can cover the amount. Returns `(from, to)`.
    ///
    /// The balance read here is advisory; the transfer itself relies on the
    /// store's non-negative balance constraint.
    pub async fn validate_transfer(&self, request: &TransferRequest) -> Result<(Account, Account)> {
        let from = self.valid_account(request.from_account_id, &request.currency).await?;
        let to = self.valid_account(request.to_account_id, &request.currency).await?;

        if !from.has_sufficient_funds(request.amount) {
            return Err(AppError::Validation(format!(
                "Insufficient funds: account '{}' cannot cover the requested amount",
                from.id
            )));
        }

        Ok((from, to))
    }

    async fn valid_account(&self, id: i64, currency: &str) -> Result<Account> {
        let account = self.find_by_id(id).await?;

        if !account.holds_currency(currency) {
            return Err(AppError::Validation(format!(
                "Account '{}' currency mismatch: {} vs {}",
                id, account.currency, currency
            )));
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryLedgerStore::new()))
    }

    fn open(owner: &str, currency: &str, balance: Decimal) -> CreateAccountRequest {
        CreateAccountRequest {
            owner: owner.to_string(),
            currency: currency.to_string(),
            initial_balance: Some(balance),
        }
    }

    fn transfer(from: i64, to: i64, amount: Decimal, currency: &str) -> TransferRequest {
        TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount,
            currency: currency.to_string(),
            description: String::new(),
            fee: dec!(1),
        }
    }

    #[tokio::test]
    async fn test_open_account_validation() {
        let service = service();

        let err = service.open_account(open("  ", "USD", dec!(0))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service.open_account(open("alice", "GBP", dec!(0))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service.open_account(open("alice", "USD", dec!(-1))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .open_account(open("alice", "USD", dec!(0.000000001)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .open_account(open("alice", "USD", Decimal::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let account = service.open_account(open("alice", "USD", dec!(10))).await.unwrap();
        assert_eq!(account.balance, dec!(10));
        assert_eq!(account.currency, "USD");
    }

    #[tokio::test]
    async fn test_find_missing_account() {
        let err = service().find_by_id(404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_accounts_rejects_bad_page() {
        let err = service()
            .list_accounts(None, Page::new(1, 50))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_account() {
        let err = service().delete_account(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_transfer() {
        let service = service();
        let usd = service.open_account(open("alice", "USD", dec!(100))).await.unwrap();
        let usd2 = service.open_account(open("bob", "USD", dec!(0))).await.unwrap();
        let eur = service.open_account(open("carol", "EUR", dec!(100))).await.unwrap();

        let (from, to) = service
            .validate_transfer(&transfer(usd.id, usd2.id, dec!(100), "USD"))
            .await
            .unwrap();
        assert_eq!((from.id, to.id), (usd.id, usd2.id));

        let err = service
            .validate_transfer(&transfer(usd.id, 99, dec!(1), "USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service
            .validate_transfer(&transfer(usd.id, eur.id, dec!(1), "USD"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("currency mismatch"));

        let err = service
            .validate_transfer(&transfer(usd.id, usd2.id, dec!(100.01), "USD"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Insufficient funds"));
    }
}
