use bank_ledger::config::Settings;
use bank_ledger::observability::{init_logging, init_metrics};
use bank_ledger::repositories::{LedgerQueries, LedgerStore, PgLedgerStore};
use bank_ledger::services::{AccountService, LedgerService, TransferEngine, TransferService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    init_logging(&settings.application.log_config());
    init_metrics(settings.metrics.exporter_addr)?;
    info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(settings.database.acquire_timeout())
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    let store = PgLedgerStore::new(pool).with_options(settings.database.store_options());

    info!("Applying ledger schema...");
    store.migrate().await?;

    store.health_check().await?;
    info!("Database health check passed");

    let shared = Arc::new(store);
    let queries: Arc<dyn LedgerQueries> = shared.clone();
    let transactions: Arc<dyn LedgerStore> = shared;

    let mut engine = TransferEngine::new(transactions);
    if let Some(timeout) = settings.transfer.timeout() {
        engine = engine.with_timeout(timeout);
    }

    let accounts = AccountService::new(queries.clone());
    let _transfers = TransferService::new(accounts, engine);
    let _ledger = LedgerService::new(queries);

    info!(
        isolation_level = settings.database.isolation_level.as_sql(),
        "Transfer engine ready"
    );

    // Without an exporter the binary only verifies startup. With one, it
    // stays up serving /metrics until interrupted.
    if settings.metrics.exporter_addr.is_some() {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
    }

    Ok(())
}
