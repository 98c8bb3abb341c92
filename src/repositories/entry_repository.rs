use crate::error::Result;
use crate::models::Entry;
use rust_decimal::Decimal;
use sqlx::PgExecutor;

/// Queries against the append-only `entries` table.
pub struct EntryRepository;

impl EntryRepository {
    /// Creates a new ledger entry.
    pub async fn create<'e, E>(executor: E, account_id: i64, amount: Decimal) -> Result<Entry>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Finds a ledger entry by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Entry>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Finds entries for an account with pagination, oldest first.
    pub async fn find_by_account<'e, E>(
        executor: E,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
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
