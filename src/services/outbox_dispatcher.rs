//! Background publisher draining the write-then-publish outbox onto the bus (§4.1).

use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::{EventBus, OutboxRepository};

pub async fn run(
    outbox: Arc<dyn OutboxRepository>,
    bus: Arc<dyn EventBus>,
    batch_size: u32,
    retry_cap: u32,
    poll_interval: Duration,
) -> ! {
    loop {
        match outbox.fetch_pending(batch_size).await {
            Ok(rows) if rows.is_empty() => tokio::time::sleep(poll_interval).await,
            Ok(rows) => {
                for row in rows {
                    match bus.publish(&row.topic, &row.envelope).await {
                        Ok(()) => {
                            if let Err(e) = outbox.mark_published(row.id).await {
                                tracing::error!(outbox_id = %row.id, error = %e, "failed to mark outbox row published");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(outbox_id = %row.id, error = %e, "bus publish failed, will retry");
                            match outbox.record_failure(row.id).await {
                                Ok(attempts) if attempts >= retry_cap => {
                                    tracing::error!(
                                        outbox_id = %row.id, attempts,
                                        "outbox row exceeded retry cap, still retrying"
                                    );
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    tracing::error!(outbox_id = %row.id, error = %e, "failed to record outbox failure")
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch pending outbox rows");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteEventBus, SqliteOutboxRepository};
    use crate::domain::models::event::{EventEnvelope, TOPIC_TASK_EVENTS, TYPE_TASK_LIFECYCLE};

    #[tokio::test]
    async fn a_pending_row_is_published_then_disappears_from_pending() {
        let pool = create_migrated_test_pool().await.unwrap();
        let outbox: Arc<dyn OutboxRepository> = Arc::new(SqliteOutboxRepository::new(pool.clone()));
        let bus: Arc<dyn EventBus> = Arc::new(SqliteEventBus::new(pool.clone()));

        let envelope = EventEnvelope::new(TYPE_TASK_LIFECYCLE, "task-api", serde_json::json!({}));
        outbox.enqueue(TOPIC_TASK_EVENTS, &envelope).await.unwrap();

        let pending = outbox.fetch_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);

        bus.publish(&pending[0].topic, &pending[0].envelope).await.unwrap();
        outbox.mark_published(pending[0].id).await.unwrap();

        assert!(outbox.fetch_pending(10).await.unwrap().is_empty());
        assert!(bus.poll_next(TOPIC_TASK_EVENTS, "audit").await.unwrap().is_some());
    }
}
