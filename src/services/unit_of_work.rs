use crate::error::{AppError, Result};
use crate::observability::get_metrics;
use crate::repositories::{LedgerStore, LedgerTx};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Future returned by a unit-of-work body. It borrows the open transaction.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>;

/// Side effect run once the unit of work has committed.
///
/// A failing hook is logged and counted; the committed state stays.
#[async_trait]
pub trait PostCommitHook<T: Sync>: Send + Sync {
    async fn after_commit(&self, committed: &T) -> anyhow::Result<()>;
}

/// Runs a body inside one store transaction.
///
/// The body commits as a whole or not at all: any error it returns, an expired
/// deadline, or cancellation rolls the transaction back.
#[derive(Clone)]
pub struct UnitOfWork {
    store: Arc<dyn LedgerStore>,
    timeout: Option<Duration>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bounds the time the body may run before it is rolled back.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn execute<T, F>(&self, body: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> TxFuture<'t, T> + Send,
    {
        self.execute_cancellable(body, std::future::pending()).await
    }

    /// Like [`execute`](Self::execute), but rolls back and returns
    /// `Cancelled` as soon as `cancel` completes.
    pub async fn execute_cancellable<T, F, C>(&self, body: F, cancel: C) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> TxFuture<'t, T> + Send,
        C: Future<Output = ()> + Send,
    {
        let mut tx = self.store.begin().await?;

        let outcome = {
            let work = body(&mut *tx);
            let bounded = async {
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                        Err(AppError::Cancelled(format!("deadline of {:?} exceeded", limit)))
                    }),
                    None => work.await,
                }
            };

            // Cancellation wins over a body that is ready in the same poll.
            tokio::select! {
                biased;
                _ = cancel => Err(AppError::Cancelled("unit of work cancelled".to_string())),
                result = bounded => result,
            }
        };

        match outcome {
            Ok(value) => {
                if let Err(err) = tx.commit().await {
                    warn!(error = %err, "commit failed");
                    get_metrics().record_rollback(err.reason());
                    return Err(err);
                }
                debug!("unit of work committed");
                Ok(value)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }

    /// Runs `body`, then `hook` on the committed value.
    pub async fn execute_with_hook<T, F>(&self, body: F, hook: &dyn PostCommitHook<T>) -> Result<T>
    where
        T: Send + Sync,
        F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> TxFuture<'t, T> + Send,
    {
        let value = self.execute(body).await?;
        run_post_commit_hook(hook, &value).await;
        Ok(value)
    }
}

async fn abort(mut tx: Box<dyn LedgerTx>, err: AppError) -> AppError {
    get_metrics().record_rollback(err.reason());

    match tx.rollback().await {
        Ok(()) => {
            warn!(error = %err, reason = err.reason(), "unit of work rolled back");
            err
        }
        Err(rollback) => {
            error!(error = %err, rollback_error = %rollback, "rollback failed");
            AppError::Rollback {
                source: Box::new(err),
                rollback: Box::new(rollback),
            }
        }
    }
}

pub(crate) async fn run_post_commit_hook<T: Sync>(hook: &dyn PostCommitHook<T>, value: &T) {
    if let Err(err) = hook.after_commit(value).await {
        warn!(error = %err, "post-commit hook failed");
        get_metrics().record_hook_failure();
    }
}
