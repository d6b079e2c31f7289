//! Port for Reminder persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::reminder::Reminder;

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn create(&self, reminder: &Reminder) -> DomainResult<()>;
    async fn get(&self, user_id: &str, task_id: Uuid, reminder_id: Uuid) -> DomainResult<Option<Reminder>>;
    async fn list_for_task(&self, user_id: &str, task_id: Uuid) -> DomainResult<Vec<Reminder>>;
    async fn delete(&self, user_id: &str, task_id: Uuid, reminder_id: Uuid) -> DomainResult<Option<Reminder>>;
    /// Deletes every reminder for a task, returning the deleted rows so callers can cancel
    /// their scheduler handles. Used by the task-delete cascade.
    async fn delete_all_for_task(&self, user_id: &str, task_id: Uuid) -> DomainResult<Vec<Reminder>>;
    async fn get_by_id(&self, id: Uuid) -> DomainResult<Option<Reminder>>;
    async fn delete_by_id(&self, id: Uuid) -> DomainResult<bool>;
}
