use crate::error::{AppError, Result};
use crate::models::Account;
use crate::repositories::LedgerTx;
use rust_decimal::Decimal;
use tracing::debug;

/// Applies a signed delta to one account inside the open transaction and
/// returns the post-update row.
///
/// The update itself takes the row's exclusive lock. A delta that would make the
/// balance negative is rejected by the store as a `Conflict`.
pub async fn apply_delta(tx: &mut dyn LedgerTx, account_id: i64, delta: Decimal) -> Result<Account> {
    let account = tx
        .add_account_balance(account_id, delta)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", account_id)))?;

    debug!(account_id, balance = %account.balance, "balance updated");
    Ok(account)
}

/// Applies both transfer deltas, locking the smaller account id first.
/// Returns the updated `(from, to)` accounts.
pub async fn apply_transfer_deltas(
    tx: &mut dyn LedgerTx,
    from_account_id: i64,
    to_account_id: i64,
    amount: Decimal,
) -> Result<(Account, Account)> {
    if from_account_id < to_account_id {
        let from = apply_delta(tx, from_account_id, -amount).await?;
        let to = apply_delta(tx, to_account_id, amount).await?;
        Ok((from, to))
    } else {
        let to = apply_delta(tx, to_account_id, amount).await?;
        let from = apply_delta(tx, from_account_id, -amount).await?;
        Ok((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::store::MockLedgerTx;
    use chrono::Utc;
    use mockall::Sequence;
    use rust_decimal_macros::dec;

    fn account(id: i64, balance: Decimal) -> Account {
        Account {
            id,
            owner: format!("owner-{}", id),
            balance,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_apply_delta_returns_updated_row() {
        let mut tx = MockLedgerTx::new();
        tx.expect_add_account_balance()
            .withf(|id, delta| *id == 4 && *delta == dec!(-25))
            .times(1)
            .returning(|id, _| Ok(Some(account(id, dec!(75)))));

        let updated = apply_delta(&mut tx, 4, dec!(-25)).await.unwrap();
        assert_eq!(updated.balance, dec!(75));
    }

    #[tokio::test]
    async fn test_apply_delta_missing_account() {
        let mut tx = MockLedgerTx::new();
        tx.expect_add_account_balance().returning(|_, _| Ok(None));

        let err = apply_delta(&mut tx, 9, dec!(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deltas_lock_smaller_id_first() {
        let mut seq = Sequence::new();
        let mut tx = MockLedgerTx::new();
        tx.expect_add_account_balance()
            .withf(|id, delta| *id == 2 && *delta == dec!(10))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, _| Ok(Some(account(id, dec!(60)))));
        tx.expect_add_account_balance()
            .withf(|id, delta| *id == 7 && *delta == dec!(-10))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, _| Ok(Some(account(id, dec!(90)))));

        let (from, to) = apply_transfer_deltas(&mut tx, 7, 2, dec!(10)).await.unwrap();
        assert_eq!(from.id, 7);
        assert_eq!(from.balance, dec!(90));
        assert_eq!(to.id, 2);
        assert_eq!(to.balance, dec!(60));
    }
}
