//! Port for Task persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::task::{Priority, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatusFilter {
    Completed,
    Pending,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    DueAt,
    Priority,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub status: Option<TaskStatusFilter>,
    pub due_before: Option<chrono::DateTime<chrono::Utc>>,
    pub due_after: Option<chrono::DateTime<chrono::Utc>>,
    pub search: Option<String>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

impl Default for TaskStatusFilter {
    fn default() -> Self {
        Self::All
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;
    async fn get(&self, user_id: &str, id: Uuid) -> DomainResult<Option<Task>>;
    async fn list(&self, user_id: &str, filter: &TaskFilter) -> DomainResult<Vec<Task>>;
    async fn update(&self, task: &Task) -> DomainResult<()>;
    /// Deletes the task row only; callers are responsible for cascading reminders first.
    async fn delete(&self, user_id: &str, id: Uuid) -> DomainResult<bool>;
}
