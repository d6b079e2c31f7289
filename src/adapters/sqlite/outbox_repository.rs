//! SQLite implementation of the write-then-publish outbox.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::event::EventEnvelope;
use crate::domain::ports::outbox_repository::{OutboxRepository, OutboxRow, OutboxStatus};

#[derive(Clone)]
pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue as part of a caller-managed transaction, so the task mutation
    /// and the outbox insert commit or roll back together.
    pub async fn enqueue_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        topic: &str,
        envelope: &EventEnvelope,
    ) -> DomainResult<()> {
        let envelope_json = serde_json::to_string(envelope)?;
        sqlx::query(
            r#"INSERT INTO outbox (id, topic, event_id, envelope, status, attempts, created_at)
               VALUES (?, ?, ?, ?, 'pending', 0, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(topic)
        .bind(envelope.id.to_string())
        .bind(&envelope_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn enqueue(&self, topic: &str, envelope: &EventEnvelope) -> DomainResult<()> {
        let envelope_json = serde_json::to_string(envelope)?;
        sqlx::query(
            r#"INSERT INTO outbox (id, topic, event_id, envelope, status, attempts, created_at)
               VALUES (?, ?, ?, ?, 'pending', 0, ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(topic)
        .bind(envelope.id.to_string())
        .bind(&envelope_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_pending(&self, limit: u32) -> DomainResult<Vec<OutboxRow>> {
        let rows: Vec<OutboxRowSql> =
            sqlx::query_as("SELECT * FROM outbox WHERE status = 'pending' ORDER BY created_at LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_published(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE outbox SET status = 'published' WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid) -> DomainResult<u32> {
        sqlx::query("UPDATE outbox SET attempts = attempts + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        let attempts: (i64,) = sqlx::query_as("SELECT attempts FROM outbox WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(attempts.0 as u32)
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRowSql {
    id: String,
    topic: String,
    envelope: String,
    status: String,
    attempts: i64,
}

impl TryFrom<OutboxRowSql> for OutboxRow {
    type Error = DomainError;

    fn try_from(row: OutboxRowSql) -> Result<Self, Self::Error> {
        let envelope: EventEnvelope = serde_json::from_str(&row.envelope)?;
        let status = match row.status.as_str() {
            "published" => OutboxStatus::Published,
            _ => OutboxStatus::Pending,
        };
        Ok(OutboxRow {
            id: Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            topic: row.topic,
            envelope,
            status,
            attempts: row.attempts as u32,
        })
    }
}
