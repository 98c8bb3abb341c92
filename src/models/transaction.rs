use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The logical transfer event between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Magnitude moved; always positive.
    pub amount: Decimal,
    /// Recorded with the transfer but not debited from either balance.
    pub fee: Decimal,
    pub currency: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns true if `account_id` is either side of the transfer.
    pub fn involves(&self, account_id: i64) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }
}

/// Values for a new transaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_involves() {
        let tx = Transaction {
            id: 9,
            from_account_id: 1,
            to_account_id: 2,
            amount: dec!(30),
            fee: dec!(1),
            currency: "USD".to_string(),
            description: "rent".to_string(),
            created_at: Utc::now(),
        };

        assert!(tx.involves(1));
        assert!(tx.involves(2));
        assert!(!tx.involves(3));
    }
}
