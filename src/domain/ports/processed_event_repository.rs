//! Port for consumer-side idempotency tracking.
//!
//! Each consumer (Audit, Notification, Recurring) owns its own
//! `processed_events` table; implementations are constructed against one
//! table each so the dedup check never leaks across consumers.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait ProcessedEventRepository: Send + Sync {
    /// Read-only membership check, used before running a consumer's effect.
    async fn is_processed(&self, event_id: Uuid) -> DomainResult<bool>;

    /// Marks `event_id` processed as part of a caller-managed transaction.
    /// Returns `true` if this insert is the one that newly marked it (the
    /// unique constraint makes the insert itself atomic); `false` if another
    /// delivery already marked it first. Callers must only commit `tx` after
    /// the effect this event triggers has already succeeded, so the mark and
    /// the effect's own writes land in the caller's transaction together.
    async fn mark_processed_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        event_id: Uuid,
    ) -> DomainResult<bool>;
}
