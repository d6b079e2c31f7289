//! Notification Consumer: delivers each reminder trigger exactly once (§4.4).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::event::{EventEnvelope, TOPIC_REMINDERS};
use crate::domain::ports::{EventBus, ProcessedEventRepository};
use crate::services::consumer_loop::{self, ConsumerEffect};

/// The delivery channel for reminder notifications. Production wiring logs via
/// tracing; tests substitute a recording sink to assert on exactly-once delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, user_id: &str, task_id: &str, title: &str) -> DomainResult<()>;
}

pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn send(&self, user_id: &str, task_id: &str, title: &str) -> DomainResult<()> {
        tracing::info!(user_id, task_id, title, "reminder fired");
        Ok(())
    }
}

struct NotificationEffect {
    sink: Arc<dyn NotificationSink>,
}

#[async_trait]
impl ConsumerEffect for NotificationEffect {
    async fn handle(&self, envelope: &EventEnvelope, _tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> DomainResult<()> {
        let user_id = envelope
            .data
            .get("user_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomainError::SerializationError("missing user_id on reminder envelope".into()))?;
        let task_id = envelope
            .data
            .get("task_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomainError::SerializationError("missing task_id on reminder envelope".into()))?;
        let title = envelope.data.get("title").and_then(|v| v.as_str()).unwrap_or("");
        self.sink.send(user_id, task_id, title).await
    }
}

pub async fn run(
    bus: Arc<dyn EventBus>,
    pool: SqlitePool,
    sink: Arc<dyn NotificationSink>,
    processed: Arc<dyn ProcessedEventRepository>,
    poll_interval: Duration,
) -> ! {
    consumer_loop::run(
        bus,
        pool,
        TOPIC_REMINDERS,
        "notify",
        processed,
        poll_interval,
        Arc::new(NotificationEffect { sink }),
    )
    .await
}
