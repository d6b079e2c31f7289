//! Domain models.
//!
//! Pure entities with business logic and validation rules. Framework-agnostic.

pub mod audit_entry;
pub mod config;
pub mod event;
pub mod reminder;
pub mod task;

pub use audit_entry::{AuditEntry, AuditFilter, TaskEventType};
pub use config::{AuthConfig, Config, OutboxConfig, SchedulerConfig, ServerConfig, StoreConfig};
pub use event::{
    BusMessage, EventEnvelope, TOPIC_REMINDERS, TOPIC_TASK_EVENTS, TOPIC_TASK_UPDATES,
    TYPE_REMINDER_TRIGGER, TYPE_TASK_LIFECYCLE, TYPE_TASK_UPDATE,
};
pub use reminder::Reminder;
pub use task::{NewTaskFields, Priority, RecurrenceRule, Task, TaskPatch};
