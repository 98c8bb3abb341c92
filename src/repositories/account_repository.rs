use crate::error::Result;
use crate::models::{Account, NewAccount};
use rust_decimal::Decimal;
use sqlx::PgExecutor;

/// Queries against the `accounts` table.
/// Every function takes an executor so it runs equally on the pool or inside a transaction.
pub struct AccountRepository;

impl AccountRepository {
    /// Creates a new account in the database.
    pub async fn create<'e, E>(executor: E, account: &NewAccount) -> Result<Account>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&account.owner)
        .bind(account.balance)
        .bind(&account.currency)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Finds an account by id.
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Account>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Lists accounts, optionally for one owner, in id order.
    pub async fn list<'e, E>(
        executor: E,
        owner: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE ($1::text IS NULL OR owner = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Adds a signed delta to the balance in one statement.
    ///
    /// The UPDATE takes the row's exclusive lock, so concurrent deltas on the same
    /// account queue behind each other instead of losing updates.
    pub async fn add_balance<'e, E>(executor: E, id: i64, delta: Decimal) -> Result<Option<Account>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Hard-deletes an account. Foreign keys from `entries` and `transactions`
    /// reject the delete while any history references the account.
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
