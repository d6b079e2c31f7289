//! Per-consumer idempotency tracking, shared by Audit, Notification, and Recurring.
//!
//! Each consumer constructs its own instance pointed at its own table name so
//! dedup state never leaks between consumers, mirroring the per-service
//! ownership rule in §3.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::ports::ProcessedEventRepository;

#[derive(Clone)]
pub struct SqliteProcessedEventRepository {
    pool: SqlitePool,
    table: &'static str,
}

impl SqliteProcessedEventRepository {
    pub const AUDIT_TABLE: &'static str = "audit_processed_events";
    pub const NOTIFICATION_TABLE: &'static str = "notification_processed_events";
    pub const RECURRING_TABLE: &'static str = "recurring_processed_events";

    pub fn new(pool: SqlitePool, table: &'static str) -> Self {
        Self { pool, table }
    }
}

#[async_trait]
impl ProcessedEventRepository for SqliteProcessedEventRepository {
    async fn is_processed(&self, event_id: Uuid) -> DomainResult<bool> {
        let query = format!("SELECT 1 FROM {} WHERE event_id = ?", self.table);
        let row: Option<(i64,)> = sqlx::query_as(&query)
            .bind(event_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_processed_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        event_id: Uuid,
    ) -> DomainResult<bool> {
        let query = format!("INSERT OR IGNORE INTO {} (event_id, processed_at) VALUES (?, ?)", self.table);
        let result = sqlx::query(&query)
            .bind(event_id.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
