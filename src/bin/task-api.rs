//! Task API binary: the HTTP front door plus its two background loops (§3, §4.1).

use std::sync::Arc;
use std::time::Duration;

use todo_core::adapters::sqlite::{
    initialize_database, SqliteAuditRepository, SqliteEventBus, SqliteOutboxRepository, SqliteReminderRepository,
    SqliteTaskRepository,
};
use todo_core::infrastructure::config::ConfigLoader;
use todo_core::infrastructure::http::{router, AppState};
use todo_core::infrastructure::logging::LoggerImpl;
use todo_core::services::{TaskService, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;

    let pool = initialize_database(&config.store.path, config.store.max_connections).await?;

    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let reminders = Arc::new(SqliteReminderRepository::new(pool.clone()));
    let task_service = Arc::new(TaskService::new(pool.clone(), tasks, reminders));
    let audit = Arc::new(SqliteAuditRepository::new(pool.clone()));
    let verifier = Arc::new(TokenVerifier::new(&config.auth.jwt_secret));

    let outbox = Arc::new(SqliteOutboxRepository::new(pool.clone()));
    let bus = Arc::new(SqliteEventBus::new(pool.clone()));
    tokio::spawn(todo_core::services::outbox_dispatcher::run(
        outbox,
        bus,
        config.outbox.batch_size,
        config.outbox.retry_cap,
        Duration::from_millis(config.outbox.poll_interval_ms),
    ));

    let scheduler_jobs = Arc::new(todo_core::adapters::sqlite::SqliteScheduledJobRepository::new(pool.clone()));
    tokio::spawn(todo_core::services::scheduler::run(
        scheduler_jobs,
        Duration::from_millis(config.scheduler.poll_interval_ms),
        config.outbox.batch_size,
        config.scheduler.retry_cap,
    ));

    let state = AppState {
        pool: pool.clone(),
        tasks: task_service,
        audit,
        verifier,
        internal_secret: config.auth.internal_secret.clone(),
        callback_base_url: config.scheduler.callback_base_url.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(bind_addr = %config.server.bind_addr, "task-api listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
