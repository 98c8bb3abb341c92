use crate::error::{AppError, Result};
use crate::models::{Entry, Page, Transaction};
use crate::repositories::LedgerQueries;
use rust_decimal::Decimal;
use std::sync::Arc;
use validator::Validate;

const AUDIT_BATCH_SIZE: i64 = 500;

/// Read access to the ledger history.
#[derive(Clone)]
pub struct LedgerService {
    queries: Arc<dyn LedgerQueries>,
}

impl LedgerService {
    pub fn new(queries: Arc<dyn LedgerQueries>) -> Self {
        Self { queries }
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry> {
        self.queries
            .get_entry(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry '{}' not found", id)))
    }

    /// Lists an account's entries, oldest first.
    pub async fn list_entries(&self, account_id: i64, page: Page) -> Result<Vec<Entry>> {
        page.validate()?;
        self.queries
            .list_entries(account_id, page.limit(), page.offset())
            .await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Transaction> {
        self.queries
            .get_transaction(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction '{}' not found", id)))
    }

    /// Lists transactions with the account on either side, oldest first.
    pub async fn list_transactions(&self, account_id: i64, page: Page) -> Result<Vec<Transaction>> {
        page.validate()?;
        self.queries
            .list_transactions(account_id, page.limit(), page.offset())
            .await
    }

    /// Sum of every entry recorded for the account.
    ///
    /// Opening balances are not journaled, so this equals the account's
    /// balance minus its opening balance.
    pub async fn net_entry_sum(&self, account_id: i64) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        let mut offset = 0;

        loop {
            let batch = self
                .queries
                .list_entries(account_id, AUDIT_BATCH_SIZE, offset)
                .await?;
            for entry in &batch {
                total = total.checked_add(entry.amount).ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "entry sum for account {} overflowed",
                        account_id
                    ))
                })?;
            }

            if (batch.len() as i64) < AUDIT_BATCH_SIZE {
                return Ok(total);
            }
            offset += AUDIT_BATCH_SIZE;
        }
    }
}
