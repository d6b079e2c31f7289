//! Notification Consumer binary: delivers each reminder trigger exactly once (§4.4).

use std::sync::Arc;
use std::time::Duration;

use todo_core::adapters::sqlite::{initialize_database, SqliteEventBus, SqliteProcessedEventRepository};
use todo_core::infrastructure::config::ConfigLoader;
use todo_core::infrastructure::logging::LoggerImpl;
use todo_core::services::notification_consumer::TracingNotificationSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;

    let pool = initialize_database(&config.store.path, config.store.max_connections).await?;
    let bus = Arc::new(SqliteEventBus::new(pool.clone()));
    let sink = Arc::new(TracingNotificationSink);
    let processed = Arc::new(SqliteProcessedEventRepository::new(
        pool.clone(),
        SqliteProcessedEventRepository::NOTIFICATION_TABLE,
    ));

    tracing::info!("notification-consumer starting");
    todo_core::services::notification_consumer::run(
        bus,
        pool,
        sink,
        processed,
        Duration::from_millis(config.outbox.poll_interval_ms),
    )
    .await
}
