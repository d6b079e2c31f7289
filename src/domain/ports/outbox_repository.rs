//! Port for the write-then-publish outbox (§4.1 of the design).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::event::EventEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Published,
}

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: Uuid,
    pub topic: String,
    pub envelope: EventEnvelope,
    pub status: OutboxStatus,
    pub attempts: u32,
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Inserts a pending outbox row. Callers run this inside the same transaction
    /// as the task mutation it accompanies.
    async fn enqueue(&self, topic: &str, envelope: &EventEnvelope) -> DomainResult<()>;
    async fn fetch_pending(&self, limit: u32) -> DomainResult<Vec<OutboxRow>>;
    async fn mark_published(&self, id: Uuid) -> DomainResult<()>;
    async fn record_failure(&self, id: Uuid) -> DomainResult<u32>;
}
