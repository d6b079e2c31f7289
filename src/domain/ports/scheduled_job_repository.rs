//! Port for the embedded Scheduler's durable timer queue (§4.6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Fired,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub fire_at: DateTime<Utc>,
    pub url: String,
    pub payload: Value,
    pub status: JobStatus,
    pub attempts: u32,
}

#[async_trait]
pub trait ScheduledJobRepository: Send + Sync {
    async fn schedule(&self, fire_at: DateTime<Utc>, url: &str, payload: Value) -> DomainResult<Uuid>;
    async fn cancel(&self, id: Uuid) -> DomainResult<()>;
    /// Atomically claims up to `limit` due, pending jobs (row-level lock via `BEGIN IMMEDIATE`).
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ScheduledJob>>;
    async fn mark_fired(&self, id: Uuid) -> DomainResult<()>;
    async fn record_failure(&self, id: Uuid) -> DomainResult<u32>;
}
