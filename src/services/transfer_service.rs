use crate::error::Result;
use crate::observability::get_metrics;
use crate::services::account_service::AccountService;
use crate::services::transfer_engine::{TransferEngine, TransferRequest, TransferResult};
use crate::services::unit_of_work::PostCommitHook;
use tracing::debug;

/// Entry point for callers: checks both accounts, then runs the transfer.
#[derive(Clone)]
pub struct TransferService {
    accounts: AccountService,
    engine: TransferEngine,
}

impl TransferService {
    pub fn new(accounts: AccountService, engine: TransferEngine) -> Self {
        Self { accounts, engine }
    }

    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferResult> {
        self.check(&request).await?;
        self.engine.transfer(request).await
    }

    /// Like [`transfer`](Self::transfer), with `hook` run after commit.
    pub async fn transfer_with_hook(
        &self,
        request: TransferRequest,
        hook: &dyn PostCommitHook<TransferResult>,
    ) -> Result<TransferResult> {
        self.check(&request).await?;
        self.engine.transfer_with_hook(request, hook).await
    }

    async fn check(&self, request: &TransferRequest) -> Result<()> {
        if let Err(err) = self.accounts.validate_transfer(request).await {
            debug!(error = %err, "transfer rejected before execution");
            get_metrics().record_transfer_failed(err.reason());
            return Err(err);
        }
        Ok(())
    }
}
