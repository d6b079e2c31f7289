//! SQLite implementation of the embedded Scheduler's durable timer queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::scheduled_job_repository::{JobStatus, ScheduledJob, ScheduledJobRepository};

#[derive(Clone)]
pub struct SqliteScheduledJobRepository {
    pool: SqlitePool,
}

impl SqliteScheduledJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduledJobRepository for SqliteScheduledJobRepository {
    async fn schedule(&self, fire_at: DateTime<Utc>, url: &str, payload: Value) -> DomainResult<Uuid> {
        let id = Uuid::new_v4();
        let payload_json = serde_json::to_string(&payload)?;
        sqlx::query(
            r#"INSERT INTO scheduled_jobs (id, fire_at, url, payload, status, attempts, created_at)
               VALUES (?, ?, ?, ?, 'pending', 0, ?)"#,
        )
        .bind(id.to_string())
        .bind(fire_at.to_rfc3339())
        .bind(url)
        .bind(&payload_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn cancel(&self, id: Uuid) -> DomainResult<()> {
        // Best-effort: only a still-pending job is cancellable; an already-fired
        // one is left untouched (it already delivered).
        sqlx::query("UPDATE scheduled_jobs SET status = 'cancelled' WHERE id = ? AND status = 'pending'")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledJob>> {
        // `sqlx::Transaction` always opens with a plain `BEGIN`, which is DEFERRED
        // and only takes SQLite's write lock on the first write statement — too
        // late to prevent two workers both selecting the same pending rows. Take
        // the write lock up front by issuing `BEGIN IMMEDIATE` on a raw connection
        // ourselves instead of going through `pool.begin()`.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let claimed: DomainResult<Vec<JobRow>> = async {
            let rows: Vec<JobRow> = sqlx::query_as(
                "SELECT * FROM scheduled_jobs WHERE status = 'pending' AND fire_at <= ? ORDER BY fire_at LIMIT ?",
            )
            .bind(now.to_rfc3339())
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

            for row in &rows {
                sqlx::query("UPDATE scheduled_jobs SET status = 'claimed' WHERE id = ?")
                    .bind(&row.id)
                    .execute(&mut *conn)
                    .await?;
            }
            Ok(rows)
        }
        .await;

        match claimed {
            Ok(rows) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                rows.into_iter().map(TryInto::try_into).collect()
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn mark_fired(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE scheduled_jobs SET status = 'fired' WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid) -> DomainResult<u32> {
        sqlx::query("UPDATE scheduled_jobs SET status = 'pending', attempts = attempts + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        let attempts: (i64,) = sqlx::query_as("SELECT attempts FROM scheduled_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(attempts.0 as u32)
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    fire_at: String,
    url: String,
    payload: String,
    status: String,
    attempts: i64,
}

impl TryFrom<JobRow> for ScheduledJob {
    type Error = DomainError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "fired" => JobStatus::Fired,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        };
        Ok(ScheduledJob {
            id: Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            fire_at: super::parse_datetime(&row.fire_at)?,
            url: row.url,
            payload: serde_json::from_str(&row.payload)?,
            status,
            attempts: row.attempts as u32,
        })
    }
}
