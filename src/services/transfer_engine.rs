use crate::error::{AppError, Result};
use crate::models::money::CURRENCY_CODE_LEN;
use crate::models::{fits_amount_column, Account, Entry, NewTransaction, Transaction};
use crate::observability::{get_metrics, mask_amount, LatencyTimer};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::balance_service::apply_transfer_deltas;
use crate::services::unit_of_work::{run_post_commit_hook, PostCommitHook, UnitOfWork};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Request to move `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    /// Recorded on the transaction; not debited from either balance.
    pub fee: Decimal,
}

impl TransferRequest {
    fn to_new_transaction(&self) -> NewTransaction {
        NewTransaction {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
            fee: self.fee,
            currency: self.currency.clone(),
            description: self.description.clone(),
        }
    }
}

/// Everything a committed transfer wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transaction: Transaction,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}

/// Moves funds between two accounts as one atomic unit.
///
/// A transfer writes one transaction record, a debit entry for the source and a
/// credit entry for the destination, then updates both balances. Balance rows
/// are always locked in ascending account id order, so two transfers over the
/// same pair cannot deadlock whichever direction each one runs.
#[derive(Clone)]
pub struct TransferEngine {
    uow: UnitOfWork,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            uow: UnitOfWork::new(store),
        }
    }

    /// Rolls back any transfer still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.uow = self.uow.with_timeout(timeout);
        self
    }

    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferResult> {
        self.transfer_cancellable(request, std::future::pending()).await
    }

    /// Runs the transfer, rolling it back if `cancel` completes first.
    pub async fn transfer_cancellable<C>(
        &self,
        request: TransferRequest,
        cancel: C,
    ) -> Result<TransferResult>
    where
        C: Future<Output = ()> + Send,
    {
        let timer = LatencyTimer::new();
        let currency = request.currency.clone();

        let outcome = match Self::validate_transfer_request(&request) {
            Ok(()) => {
                let span = info_span!(
                    "transfer",
                    transfer_ref = %Uuid::new_v4(),
                    from = request.from_account_id,
                    to = request.to_account_id
                );
                self.run(request, cancel).instrument(span).await
            }
            Err(err) => Err(err),
        };

        let metrics = get_metrics();
        metrics.record_transfer_latency(timer.elapsed_ms());
        match &outcome {
            Ok(_) => metrics.record_transfer(&currency),
            Err(err) => metrics.record_transfer_failed(err.reason()),
        }

        outcome
    }

    /// Runs the transfer, then `hook` with its result. A failing hook does
    /// not undo the transfer.
    pub async fn transfer_with_hook(
        &self,
        request: TransferRequest,
        hook: &dyn PostCommitHook<TransferResult>,
    ) -> Result<TransferResult> {
        let result = self.transfer(request).await?;
        run_post_commit_hook(hook, &result).await;
        Ok(result)
    }

    async fn run<C>(&self, request: TransferRequest, cancel: C) -> Result<TransferResult>
    where
        C: Future<Output = ()> + Send,
    {
        let result = self
            .uow
            .execute_cancellable(move |tx| Box::pin(record_transfer(tx, request)), cancel)
            .await;

        match &result {
            Ok(done) => info!(
                transaction_id = done.transaction.id,
                amount = %mask_amount(&done.transaction.amount),
                currency = %done.transaction.currency,
                "transfer committed"
            ),
            Err(err) => warn!(error = %err, reason = err.reason(), "transfer failed"),
        }

        result
    }

    fn validate_transfer_request(request: &TransferRequest) -> Result<()> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be positive".to_string()));
        }

        if request.fee <= Decimal::ZERO {
            return Err(AppError::Validation("Fee must be positive".to_string()));
        }

        if !fits_amount_column(&request.amount) {
            return Err(AppError::Validation(
                "Amount must have at most 8 decimal places and be below 10^12".to_string(),
            ));
        }

        if !fits_amount_column(&request.fee) {
            return Err(AppError::Validation(
                "Fee must have at most 8 decimal places and be below 10^12".to_string(),
            ));
        }

        if request.currency.trim().is_empty() {
            return Err(AppError::Validation("Currency cannot be empty".to_string()));
        }

        if request.currency.len() != CURRENCY_CODE_LEN {
            return Err(AppError::Validation(format!(
                "Currency '{}' must be a 3-letter code",
                request.currency
            )));
        }

        if request.from_account_id <= 0 || request.to_account_id <= 0 {
            return Err(AppError::Validation(
                "Account ids must be positive".to_string(),
            ));
        }

        if request.from_account_id == request.to_account_id {
            return Err(AppError::Validation(
                "Source and destination accounts must be different".to_string(),
            ));
        }

        Ok(())
    }
}

/// Writes one transfer inside the open transaction.
async fn record_transfer(tx: &mut dyn LedgerTx, request: TransferRequest) -> Result<TransferResult> {
    let transaction = tx.insert_transaction(&request.to_new_transaction()).await?;
    let from_entry = tx
        .insert_entry(request.from_account_id, -request.amount)
        .await?;
    let to_entry = tx.insert_entry(request.to_account_id, request.amount).await?;

    let (from_account, to_account) = apply_transfer_deltas(
        tx,
        request.from_account_id,
        request.to_account_id,
        request.amount,
    )
    .await?;

    Ok(TransferResult {
        transaction,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}
