use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A balance-bearing account.
///
/// The balance is only ever changed through a signed delta applied inside a store
/// transaction; the currency is fixed when the account is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Checks if the account can cover a debit of `amount`.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Returns true if the account is denominated in `currency`.
    pub fn holds_currency(&self, currency: &str) -> bool {
        self.currency == currency
    }
}

/// Values for a new account row. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub owner: String,
    pub balance: Decimal,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    /// Sets the opening balance.
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account {
            id: 1,
            owner: "alice".to_string(),
            balance,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sufficient_funds() {
        let account = account(dec!(100));
        assert!(account.has_sufficient_funds(dec!(100)));
        assert!(account.has_sufficient_funds(dec!(99.99)));
        assert!(!account.has_sufficient_funds(dec!(100.01)));
    }

    #[test]
    fn test_holds_currency() {
        let account = account(dec!(0));
        assert!(account.holds_currency("USD"));
        assert!(!account.holds_currency("EUR"));
    }

    #[test]
    fn test_new_account_defaults_to_zero_balance() {
        let new = NewAccount::new("bob", "CAD");
        assert_eq!(new.balance, Decimal::ZERO);

        let funded = new.with_balance(dec!(250));
        assert_eq!(funded.balance, dec!(250));
        assert_eq!(funded.currency, "CAD");
    }

    #[test]
    fn test_account_serialization() {
        let account = account(dec!(42.50));
        let json = serde_json::to_string(&account).unwrap();
        let deserialized: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, account);
    }
}
