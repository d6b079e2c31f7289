//! Audit Consumer: turns `task-events` into an append-only ledger (§4.3).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::audit_entry::{AuditEntry, TaskEventType};
use crate::domain::models::event::{EventEnvelope, TOPIC_TASK_EVENTS};
use crate::domain::ports::{AuditRepository, EventBus, ProcessedEventRepository};
use crate::services::consumer_loop::{self, ConsumerEffect};

struct AuditEffect {
    audit: Arc<dyn AuditRepository>,
}

#[async_trait]
impl ConsumerEffect for AuditEffect {
    async fn handle(&self, envelope: &EventEnvelope, tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> DomainResult<()> {
        let event_type = envelope
            .data
            .get("event_type")
            .and_then(|v| v.as_str())
            .and_then(TaskEventType::from_str_opt)
            .ok_or_else(|| DomainError::SerializationError("missing event_type on task-events envelope".into()))?;

        let task_data = envelope.data.get("task_data").ok_or_else(|| {
            DomainError::SerializationError("missing task_data on task-events envelope".into())
        })?;
        let task_id = task_data
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| DomainError::SerializationError("missing task id on task-events envelope".into()))?;
        let user_id = task_data
            .get("user_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomainError::SerializationError("missing user_id on task-events envelope".into()))?
            .to_string();

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            event_type,
            event_data: task_data.clone(),
            timestamp: envelope.time,
        };
        self.audit.insert_tx(tx, &entry).await
    }
}

pub async fn run(
    bus: Arc<dyn EventBus>,
    pool: SqlitePool,
    audit: Arc<dyn AuditRepository>,
    processed: Arc<dyn ProcessedEventRepository>,
    poll_interval: Duration,
) -> ! {
    consumer_loop::run(
        bus,
        pool,
        TOPIC_TASK_EVENTS,
        "audit",
        processed,
        poll_interval,
        Arc::new(AuditEffect { audit }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteAuditRepository, SqliteEventBus, SqliteProcessedEventRepository,
    };
    use crate::domain::models::audit_entry::AuditFilter;
    use crate::domain::models::event::TYPE_TASK_LIFECYCLE;
    use serde_json::json;

    #[tokio::test]
    async fn processes_a_lifecycle_event_into_an_audit_entry() {
        let pool = create_migrated_test_pool().await.unwrap();
        let bus: Arc<dyn EventBus> = Arc::new(SqliteEventBus::new(pool.clone()));
        let audit: Arc<dyn AuditRepository> = Arc::new(SqliteAuditRepository::new(pool.clone()));
        let processed: Arc<dyn ProcessedEventRepository> = Arc::new(SqliteProcessedEventRepository::new(
            pool.clone(),
            SqliteProcessedEventRepository::AUDIT_TABLE,
        ));

        let task_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            TYPE_TASK_LIFECYCLE,
            "task-api",
            json!({
                "event_type": "created",
                "task_data": { "id": task_id, "user_id": "u1", "title": "t" },
            }),
        );
        bus.publish(TOPIC_TASK_EVENTS, &envelope).await.unwrap();

        let effect = AuditEffect { audit: audit.clone() };
        let msg = bus.poll_next(TOPIC_TASK_EVENTS, "audit").await.unwrap().unwrap();
        assert!(!processed.is_processed(msg.envelope.id).await.unwrap());
        let mut tx = pool.begin().await.unwrap();
        effect.handle(&msg.envelope, &mut tx).await.unwrap();
        assert!(processed.mark_processed_tx(&mut tx, msg.envelope.id).await.unwrap());
        tx.commit().await.unwrap();
        bus.ack(TOPIC_TASK_EVENTS, "audit", msg.seq).await.unwrap();

        let entries = audit
            .list(
                "u1",
                &AuditFilter {
                    limit: AuditFilter::DEFAULT_LIMIT,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, task_id);
        assert_eq!(entries[0].event_type, TaskEventType::Created);
    }

    #[tokio::test]
    async fn redelivery_of_the_same_event_id_is_not_reprocessed() {
        let pool = create_migrated_test_pool().await.unwrap();
        let processed: Arc<dyn ProcessedEventRepository> = Arc::new(SqliteProcessedEventRepository::new(
            pool.clone(),
            SqliteProcessedEventRepository::AUDIT_TABLE,
        ));
        let event_id = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        assert!(processed.mark_processed_tx(&mut tx, event_id).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(!processed.mark_processed_tx(&mut tx, event_id).await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn a_failed_effect_leaves_the_event_unmarked_so_redelivery_retries_it() {
        let pool = create_migrated_test_pool().await.unwrap();
        let audit: Arc<dyn AuditRepository> = Arc::new(SqliteAuditRepository::new(pool.clone()));
        let processed: Arc<dyn ProcessedEventRepository> = Arc::new(SqliteProcessedEventRepository::new(
            pool.clone(),
            SqliteProcessedEventRepository::AUDIT_TABLE,
        ));

        // No `event_type` key: the effect fails before it ever inserts an AuditEntry.
        let envelope = EventEnvelope::new(TYPE_TASK_LIFECYCLE, "task-api", json!({}));
        let effect = AuditEffect { audit: audit.clone() };

        let mut tx = pool.begin().await.unwrap();
        assert!(effect.handle(&envelope, &mut tx).await.is_err());
        drop(tx);

        assert!(!processed.is_processed(envelope.id).await.unwrap());
        let entries = audit
            .list(
                "u1",
                &AuditFilter {
                    limit: AuditFilter::DEFAULT_LIMIT,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}
