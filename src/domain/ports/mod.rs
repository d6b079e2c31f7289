//! Domain ports (interfaces) for the task-management core.

pub mod audit_repository;
pub mod event_bus;
pub mod outbox_repository;
pub mod processed_event_repository;
pub mod reminder_repository;
pub mod scheduled_job_repository;
pub mod task_repository;

pub use audit_repository::AuditRepository;
pub use event_bus::{BusMessage, EventBus};
pub use outbox_repository::{OutboxRepository, OutboxRow, OutboxStatus};
pub use processed_event_repository::ProcessedEventRepository;
pub use reminder_repository::ReminderRepository;
pub use scheduled_job_repository::{JobStatus, ScheduledJob, ScheduledJobRepository};
pub use task_repository::{SortField, SortOrder, TaskFilter, TaskRepository, TaskStatusFilter};
