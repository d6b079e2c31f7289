//! SQLite implementation of the Audit Consumer's ledger.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::audit_entry::{AuditEntry, AuditFilter, TaskEventType};
use crate::domain::ports::AuditRepository;

#[derive(Clone)]
pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn insert(&self, entry: &AuditEntry) -> DomainResult<()> {
        let data_json = serde_json::to_string(&entry.event_data)?;
        sqlx::query(
            r#"INSERT INTO audit_entries (id, user_id, task_id, event_type, event_data, timestamp)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(entry.task_id.to_string())
        .bind(entry.event_type.as_str())
        .bind(&data_json)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_tx(&self, tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, entry: &AuditEntry) -> DomainResult<()> {
        let data_json = serde_json::to_string(&entry.event_data)?;
        sqlx::query(
            r#"INSERT INTO audit_entries (id, user_id, task_id, event_type, event_data, timestamp)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(entry.task_id.to_string())
        .bind(entry.event_type.as_str())
        .bind(&data_json)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn list(&self, user_id: &str, filter: &AuditFilter) -> DomainResult<Vec<AuditEntry>> {
        let limit = filter.limit.clamp(1, AuditFilter::MAX_LIMIT);
        let task_id = filter.task_id.map(|id| id.to_string());
        let event_type = filter.event_type.map(TaskEventType::as_str);

        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"SELECT * FROM audit_entries
               WHERE user_id = ?
                 AND (? IS NULL OR task_id = ?)
                 AND (? IS NULL OR event_type = ?)
               ORDER BY timestamp DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(user_id)
        .bind(&task_id)
        .bind(&task_id)
        .bind(event_type)
        .bind(event_type)
        .bind(limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    user_id: String,
    task_id: String,
    event_type: String,
    event_data: String,
    timestamp: String,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let event_type = TaskEventType::from_str_opt(&row.event_type)
            .ok_or_else(|| DomainError::SerializationError(format!("invalid event_type: {}", row.event_type)))?;
        Ok(AuditEntry {
            id: Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            user_id: row.user_id,
            task_id: Uuid::parse_str(&row.task_id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            event_type,
            event_data: serde_json::from_str(&row.event_data)?,
            timestamp: super::parse_datetime(&row.timestamp)?,
        })
    }
}
