//! Port for the Audit Consumer's append-only ledger.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::audit_entry::{AuditEntry, AuditFilter};

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, entry: &AuditEntry) -> DomainResult<()>;

    /// Insert as part of a caller-managed transaction, so the ledger row
    /// commits atomically with whatever else the caller writes in the same
    /// transaction (e.g. the Audit Consumer's dedup mark).
    async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        entry: &AuditEntry,
    ) -> DomainResult<()>;

    async fn list(&self, user_id: &str, filter: &AuditFilter) -> DomainResult<Vec<AuditEntry>>;
}
