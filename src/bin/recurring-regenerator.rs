//! Recurring Regenerator binary: creates the next occurrence on task completion (§4.5).

use std::sync::Arc;
use std::time::Duration;

use todo_core::adapters::sqlite::{initialize_database, SqliteEventBus, SqliteProcessedEventRepository};
use todo_core::infrastructure::config::ConfigLoader;
use todo_core::infrastructure::logging::LoggerImpl;
use todo_core::services::TaskApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;

    let pool = initialize_database(&config.store.path, config.store.max_connections).await?;
    let bus = Arc::new(SqliteEventBus::new(pool.clone()));
    let client = TaskApiClient::new(&config.scheduler.callback_base_url, &config.auth.internal_secret);
    let processed = Arc::new(SqliteProcessedEventRepository::new(
        pool.clone(),
        SqliteProcessedEventRepository::RECURRING_TABLE,
    ));

    tracing::info!("recurring-regenerator starting");
    todo_core::services::recurring_regenerator::run(
        bus,
        pool,
        client,
        processed,
        Duration::from_millis(config.outbox.poll_interval_ms),
    )
    .await
}
