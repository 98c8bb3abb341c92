use crate::error::Result;
use crate::models::{NewTransaction, Transaction};
use sqlx::PgExecutor;

/// Queries against the `transactions` table.
pub struct TransactionRepository;

impl TransactionRepository {
    /// Creates a new transaction record.
    pub async fn create<'e, E>(executor: E, transaction: &NewTransaction) -> Result<Transaction>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (from_account_id, to_account_id, amount, fee, currency, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, from_account_id, to_account_id, amount, fee, currency, description, created_at
            "#,
        )
        .bind(transaction.from_account_id)
        .bind(transaction.to_account_id)
        .bind(transaction.amount)
        .bind(transaction.fee)
        .bind(&transaction.currency)
        .bind(&transaction.description)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Finds a transaction by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Transaction>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, fee, currency, description, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Lists transactions touching an account on either side.
    pub async fn find_by_account<'e, E>(
        executor: E,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, fee, currency, description, created_at
            FROM transactions
            WHERE from_account_id = $1 OR to_account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
