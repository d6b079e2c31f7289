//! Embedded, table-backed realization of the Bus capability (§4.2).
//!
//! Messages are appended to `bus_messages` in strict `seq` order; each
//! consumer group tracks its own read position in `bus_cursors`. Because the
//! Task API appends a user's events in commit order, and each consumer reads
//! strictly in `seq` order, per-user ordering falls out without an explicit
//! partition key column.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::event::{BusMessage, EventEnvelope};
use crate::domain::ports::EventBus;

#[derive(Clone)]
pub struct SqliteEventBus {
    pool: SqlitePool,
}

impl SqliteEventBus {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventBus for SqliteEventBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> DomainResult<()> {
        let envelope_json = serde_json::to_string(envelope)?;
        sqlx::query("INSERT INTO bus_messages (topic, event_id, envelope, created_at) VALUES (?, ?, ?, ?)")
            .bind(topic)
            .bind(envelope.id.to_string())
            .bind(&envelope_json)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn poll_next(&self, topic: &str, consumer_group: &str) -> DomainResult<Option<BusMessage>> {
        let cursor: (i64,) = sqlx::query_as(
            "SELECT COALESCE((SELECT last_seq FROM bus_cursors WHERE topic = ? AND consumer_group = ?), 0)",
        )
        .bind(topic)
        .bind(consumer_group)
        .fetch_one(&self.pool)
        .await?;

        let row: Option<MessageRow> =
            sqlx::query_as("SELECT * FROM bus_messages WHERE topic = ? AND seq > ? ORDER BY seq LIMIT 1")
                .bind(topic)
                .bind(cursor.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| {
            let envelope: EventEnvelope = serde_json::from_str(&r.envelope)?;
            Ok(BusMessage {
                seq: r.seq,
                topic: r.topic,
                envelope,
            })
        })
        .transpose()
    }

    async fn ack(&self, topic: &str, consumer_group: &str, seq: i64) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO bus_cursors (topic, consumer_group, last_seq) VALUES (?, ?, ?)
               ON CONFLICT(topic, consumer_group) DO UPDATE SET last_seq = excluded.last_seq
               WHERE excluded.last_seq > bus_cursors.last_seq"#,
        )
        .bind(topic)
        .bind(consumer_group)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    seq: i64,
    topic: String,
    envelope: String,
}
