//! Audit Consumer binary: materializes `task-events` into the audit ledger (§4.3).

use std::sync::Arc;
use std::time::Duration;

use todo_core::adapters::sqlite::{
    initialize_database, SqliteAuditRepository, SqliteEventBus, SqliteProcessedEventRepository,
};
use todo_core::infrastructure::config::ConfigLoader;
use todo_core::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;

    let pool = initialize_database(&config.store.path, config.store.max_connections).await?;
    let bus = Arc::new(SqliteEventBus::new(pool.clone()));
    let audit = Arc::new(SqliteAuditRepository::new(pool.clone()));
    let processed = Arc::new(SqliteProcessedEventRepository::new(
        pool.clone(),
        SqliteProcessedEventRepository::AUDIT_TABLE,
    ));

    tracing::info!("audit-consumer starting");
    todo_core::services::audit_consumer::run(
        bus,
        pool,
        audit,
        processed,
        Duration::from_millis(config.outbox.poll_interval_ms),
    )
    .await
}
