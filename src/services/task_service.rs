//! The Task API's core orchestration: the sole writer of Task and Reminder
//! rows, performing the atomic write-then-publish bundles from §4.1.

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::outbox_repository::SqliteOutboxRepository;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::audit_entry::TaskEventType;
use crate::domain::models::event::{
    EventEnvelope, TOPIC_REMINDERS, TOPIC_TASK_EVENTS, TOPIC_TASK_UPDATES, TYPE_REMINDER_TRIGGER,
    TYPE_TASK_LIFECYCLE, TYPE_TASK_UPDATE,
};
use crate::domain::models::reminder::Reminder;
use crate::domain::models::task::{NewTaskFields, Task, TaskPatch};
use crate::domain::ports::task_repository::TaskFilter;
use crate::domain::ports::{ReminderRepository, TaskRepository};

const EVENT_SOURCE: &str = "task-api";

/// Orchestrates task/reminder mutations, their atomic outbox inserts, and the
/// embedded scheduler job that backs each reminder.
#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
    tasks: std::sync::Arc<dyn TaskRepository>,
    reminders: std::sync::Arc<dyn ReminderRepository>,
}

impl TaskService {
    pub fn new(
        pool: SqlitePool,
        tasks: std::sync::Arc<dyn TaskRepository>,
        reminders: std::sync::Arc<dyn ReminderRepository>,
    ) -> Self {
        Self { pool, tasks, reminders }
    }

    pub async fn create_task(&self, user_id: &str, fields: NewTaskFields) -> DomainResult<Task> {
        let task = Task::new(user_id.to_string(), fields)?;

        let mut tx = self.pool.begin().await?;
        insert_task(&mut tx, &task).await?;
        enqueue_lifecycle_event(&mut tx, TaskEventType::Created, &task).await?;
        enqueue_update_event(&mut tx, &task, "created").await?;
        tx.commit().await?;

        Ok(task)
    }

    pub async fn get_task(&self, user_id: &str, id: Uuid) -> DomainResult<Task> {
        self.tasks.get(user_id, id).await?.ok_or(DomainError::NotFound)
    }

    pub async fn list_tasks(&self, user_id: &str, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        self.tasks.list(user_id, filter).await
    }

    pub async fn update_task(&self, user_id: &str, id: Uuid, patch: TaskPatch) -> DomainResult<Task> {
        let mut task = self.get_task(user_id, id).await?;
        task.apply_patch(patch)?;

        let mut tx = self.pool.begin().await?;
        update_task_row(&mut tx, &task).await?;
        enqueue_lifecycle_event(&mut tx, TaskEventType::Updated, &task).await?;
        enqueue_update_event(&mut tx, &task, "updated").await?;
        tx.commit().await?;

        Ok(task)
    }

    pub async fn toggle_complete(&self, user_id: &str, id: Uuid) -> DomainResult<Task> {
        let mut task = self.get_task(user_id, id).await?;
        task.toggle_complete();

        let mut tx = self.pool.begin().await?;
        update_task_row(&mut tx, &task).await?;
        enqueue_lifecycle_event(&mut tx, TaskEventType::Completed, &task).await?;
        enqueue_update_event(&mut tx, &task, "completed").await?;
        tx.commit().await?;

        Ok(task)
    }

    pub async fn delete_task(&self, user_id: &str, id: Uuid) -> DomainResult<()> {
        let task = self.get_task(user_id, id).await?;

        let mut tx = self.pool.begin().await?;
        let reminders = delete_reminders_for_task(&mut tx, user_id, id).await?;
        for reminder in &reminders {
            cancel_job(&mut tx, &reminder.scheduler_handle).await?;
        }
        delete_task_row(&mut tx, user_id, id).await?;
        enqueue_lifecycle_event(&mut tx, TaskEventType::Deleted, &task).await?;
        enqueue_update_event(&mut tx, &task, "deleted").await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn create_reminder(
        &self,
        user_id: &str,
        task_id: Uuid,
        remind_at: chrono::DateTime<Utc>,
        callback_base_url: &str,
    ) -> DomainResult<Reminder> {
        Reminder::validate_remind_at(remind_at, Utc::now())?;
        // Ownership check: a reminder may only be created for a task the caller owns.
        self.get_task(user_id, task_id).await?;

        let reminder = Reminder {
            id: Uuid::new_v4(),
            task_id,
            user_id: user_id.to_string(),
            remind_at,
            created_at: Utc::now(),
            scheduler_handle: Uuid::new_v4().to_string(),
        };
        let payload = json!({ "reminder_id": reminder.id, "task_id": task_id, "user_id": user_id });
        let callback_url = format!("{callback_base_url}/internal/jobs/reminder-trigger");

        let mut tx = self.pool.begin().await?;
        insert_scheduled_job(&mut tx, &reminder.scheduler_handle, remind_at, &callback_url, &payload).await?;
        insert_reminder(&mut tx, &reminder).await?;
        tx.commit().await?;

        Ok(reminder)
    }

    pub async fn list_reminders(&self, user_id: &str, task_id: Uuid) -> DomainResult<Vec<Reminder>> {
        self.get_task(user_id, task_id).await?;
        self.reminders.list_for_task(user_id, task_id).await
    }

    pub async fn delete_reminder(&self, user_id: &str, task_id: Uuid, reminder_id: Uuid) -> DomainResult<()> {
        self.get_task(user_id, task_id).await?;
        let reminder = self
            .reminders
            .get(user_id, task_id, reminder_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut tx = self.pool.begin().await?;
        cancel_job(&mut tx, &reminder.scheduler_handle).await?;
        sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(reminder_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Handles a Scheduler callback for a fired reminder (§4.1 `OnSchedulerFire`).
    /// Missing reminder/task is treated as a benign race (e.g. the user deleted
    /// the task after the job fired but before delivery) and silently succeeds.
    pub async fn on_scheduler_fire(&self, reminder_id: Uuid, task_id: Uuid, user_id: &str) -> DomainResult<()> {
        let Some(reminder) = self.reminders.get_by_id(reminder_id).await? else {
            return Ok(());
        };

        let Some(task) = self.tasks.get(user_id, task_id).await? else {
            self.reminders.delete_by_id(reminder_id).await?;
            return Ok(());
        };

        let data = json!({
            "reminder_id": reminder_id,
            "task_id": task_id,
            "title": task.title,
            "user_id": user_id,
            "due_at": task.due_at,
            "remind_at": reminder.remind_at,
            "timestamp": Utc::now(),
        });
        let envelope = EventEnvelope::new(TYPE_REMINDER_TRIGGER, EVENT_SOURCE, data);

        let mut tx = self.pool.begin().await?;
        SqliteOutboxRepository::enqueue_tx(&mut tx, TOPIC_REMINDERS, &envelope).await?;
        sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(reminder_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }
}

async fn insert_task(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, task: &Task) -> DomainResult<()> {
    use crate::domain::models::task::{Priority, RecurrenceRule};
    let tags_json = serde_json::to_string(&task.tags)?;
    sqlx::query(
        r#"INSERT INTO tasks (id, user_id, title, description, completed, priority, tags,
           due_at, is_recurring, recurrence_rule, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(task.id.to_string())
    .bind(&task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.completed)
    .bind(task.priority.map(Priority::as_str))
    .bind(&tags_json)
    .bind(task.due_at.map(|t| t.to_rfc3339()))
    .bind(task.is_recurring)
    .bind(task.recurrence_rule.map(RecurrenceRule::as_str))
    .bind(task.created_at.to_rfc3339())
    .bind(task.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_task_row(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, task: &Task) -> DomainResult<()> {
    use crate::domain::models::task::{Priority, RecurrenceRule};
    let tags_json = serde_json::to_string(&task.tags)?;
    sqlx::query(
        r#"UPDATE tasks SET title = ?, description = ?, completed = ?, priority = ?, tags = ?,
           due_at = ?, is_recurring = ?, recurrence_rule = ?, updated_at = ?
           WHERE id = ? AND user_id = ?"#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.completed)
    .bind(task.priority.map(Priority::as_str))
    .bind(&tags_json)
    .bind(task.due_at.map(|t| t.to_rfc3339()))
    .bind(task.is_recurring)
    .bind(task.recurrence_rule.map(RecurrenceRule::as_str))
    .bind(task.updated_at.to_rfc3339())
    .bind(task.id.to_string())
    .bind(&task.user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn delete_task_row(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, user_id: &str, id: Uuid) -> DomainResult<()> {
    sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn enqueue_lifecycle_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    event_type: TaskEventType,
    task: &Task,
) -> DomainResult<()> {
    let data = json!({
        "event_type": event_type.as_str(),
        "task_data": task,
    });
    let envelope = EventEnvelope::new(TYPE_TASK_LIFECYCLE, EVENT_SOURCE, data);
    SqliteOutboxRepository::enqueue_tx(tx, TOPIC_TASK_EVENTS, &envelope).await
}

async fn enqueue_update_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task: &Task,
    change_type: &str,
) -> DomainResult<()> {
    let data = json!({
        "task_id": task.id,
        "user_id": task.user_id,
        "change_type": change_type,
        "timestamp": Utc::now(),
    });
    let envelope = EventEnvelope::new(TYPE_TASK_UPDATE, EVENT_SOURCE, data);
    SqliteOutboxRepository::enqueue_tx(tx, TOPIC_TASK_UPDATES, &envelope).await
}

async fn insert_reminder(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, reminder: &Reminder) -> DomainResult<()> {
    sqlx::query(
        r#"INSERT INTO reminders (id, task_id, user_id, remind_at, created_at, scheduler_handle)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(reminder.id.to_string())
    .bind(reminder.task_id.to_string())
    .bind(&reminder.user_id)
    .bind(reminder.remind_at.to_rfc3339())
    .bind(reminder.created_at.to_rfc3339())
    .bind(&reminder.scheduler_handle)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_scheduled_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
    fire_at: chrono::DateTime<Utc>,
    url: &str,
    payload: &serde_json::Value,
) -> DomainResult<()> {
    let payload_json = serde_json::to_string(payload)?;
    sqlx::query(
        r#"INSERT INTO scheduled_jobs (id, fire_at, url, payload, status, attempts, created_at)
           VALUES (?, ?, ?, ?, 'pending', 0, ?)"#,
    )
    .bind(id)
    .bind(fire_at.to_rfc3339())
    .bind(url)
    .bind(&payload_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn cancel_job(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, id: &str) -> DomainResult<()> {
    sqlx::query("UPDATE scheduled_jobs SET status = 'cancelled' WHERE id = ? AND status = 'pending'")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn delete_reminders_for_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: &str,
    task_id: Uuid,
) -> DomainResult<Vec<Reminder>> {
    let rows: Vec<ReminderRow> = sqlx::query_as("SELECT * FROM reminders WHERE task_id = ? AND user_id = ?")
        .bind(task_id.to_string())
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;
    let reminders: Vec<Reminder> = rows.into_iter().map(TryInto::try_into).collect::<DomainResult<_>>()?;

    sqlx::query("DELETE FROM reminders WHERE task_id = ? AND user_id = ?")
        .bind(task_id.to_string())
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(reminders)
}

#[derive(sqlx::FromRow)]
struct ReminderRow {
    id: String,
    task_id: String,
    user_id: String,
    remind_at: String,
    created_at: String,
    scheduler_handle: String,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = DomainError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        Ok(Reminder {
            id: Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            task_id: Uuid::parse_str(&row.task_id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            user_id: row.user_id,
            remind_at: crate::adapters::sqlite::parse_datetime(&row.remind_at)?,
            created_at: crate::adapters::sqlite::parse_datetime(&row.created_at)?,
            scheduler_handle: row.scheduler_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteReminderRepository, SqliteTaskRepository};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    async fn service() -> TaskService {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let reminders = Arc::new(SqliteReminderRepository::new(pool.clone()));
        TaskService::new(pool, tasks, reminders)
    }

    fn fields(title: &str) -> NewTaskFields {
        NewTaskFields {
            title: title.to_string(),
            description: None,
            priority: None,
            tags: BTreeSet::new(),
            due_at: None,
            is_recurring: false,
            recurrence_rule: None,
        }
    }

    #[tokio::test]
    async fn create_then_list_returns_task_with_defaults() {
        let svc = service().await;
        let task = svc.create_task("u1", fields("Groceries")).await.unwrap();

        let listed = svc.list_tasks("u1", &TaskFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, task.id);
        assert!(!listed[0].completed);
        assert!(listed[0].priority.is_none());
        assert!(listed[0].tags.is_empty());
    }

    #[tokio::test]
    async fn cross_user_get_is_not_found() {
        let svc = service().await;
        let task = svc.create_task("u1", fields("Groceries")).await.unwrap();
        let result = svc.get_task("u2", task.id).await;
        assert!(matches!(result, Err(DomainError::NotFound)));
    }

    #[tokio::test]
    async fn create_emits_outbox_rows() {
        let svc = service().await;
        svc.create_task("u1", fields("t")).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outbox")
            .fetch_one(&svc.pool)
            .await
            .unwrap();
        // One task-events row, one task-updates row.
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn delete_then_list_does_not_return_task() {
        let svc = service().await;
        let task = svc.create_task("u1", fields("t")).await.unwrap();
        svc.delete_task("u1", task.id).await.unwrap();

        let listed = svc.list_tasks("u1", &TaskFilter::default()).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_reminders_and_cancels_jobs() {
        let svc = service().await;
        let task = svc.create_task("u1", fields("t")).await.unwrap();
        let reminder = svc
            .create_reminder("u1", task.id, Utc::now() + chrono::Duration::seconds(60), "http://localhost:8080")
            .await
            .unwrap();

        svc.delete_task("u1", task.id).await.unwrap();

        let job_status: (String,) = sqlx::query_as("SELECT status FROM scheduled_jobs WHERE id = ?")
            .bind(&reminder.scheduler_handle)
            .fetch_one(&svc.pool)
            .await
            .unwrap();
        assert_eq!(job_status.0, "cancelled");

        let err = svc.list_reminders("u1", task.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn toggle_complete_is_an_involution_and_emits_one_event_each_call() {
        let svc = service().await;
        let task = svc.create_task("u1", fields("t")).await.unwrap();

        let once = svc.toggle_complete("u1", task.id).await.unwrap();
        assert!(once.completed);
        let twice = svc.toggle_complete("u1", task.id).await.unwrap();
        assert!(!twice.completed);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outbox WHERE topic = 'task-events'")
            .fetch_one(&svc.pool)
            .await
            .unwrap();
        // create + 2 toggles.
        assert_eq!(count.0, 3);
    }
}
