//! SQLite implementation of the ReminderRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::reminder::Reminder;
use crate::domain::ports::ReminderRepository;

#[derive(Clone)]
pub struct SqliteReminderRepository {
    pool: SqlitePool,
}

impl SqliteReminderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderRepository for SqliteReminderRepository {
    async fn create(&self, reminder: &Reminder) -> DomainResult<()> {
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
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, user_id: &str, task_id: Uuid, reminder_id: Uuid) -> DomainResult<Option<Reminder>> {
        let row: Option<ReminderRow> =
            sqlx::query_as("SELECT * FROM reminders WHERE id = ? AND task_id = ? AND user_id = ?")
                .bind(reminder_id.to_string())
                .bind(task_id.to_string())
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_task(&self, user_id: &str, task_id: Uuid) -> DomainResult<Vec<Reminder>> {
        let rows: Vec<ReminderRow> = sqlx::query_as("SELECT * FROM reminders WHERE task_id = ? AND user_id = ?")
            .bind(task_id.to_string())
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete(&self, user_id: &str, task_id: Uuid, reminder_id: Uuid) -> DomainResult<Option<Reminder>> {
        let Some(reminder) = self.get(user_id, task_id, reminder_id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM reminders WHERE id = ? AND task_id = ? AND user_id = ?")
            .bind(reminder_id.to_string())
            .bind(task_id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(Some(reminder))
    }

    async fn delete_all_for_task(&self, user_id: &str, task_id: Uuid) -> DomainResult<Vec<Reminder>> {
        let reminders = self.list_for_task(user_id, task_id).await?;
        sqlx::query("DELETE FROM reminders WHERE task_id = ? AND user_id = ?")
            .bind(task_id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(reminders)
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<Option<Reminder>> {
        let row: Option<ReminderRow> = sqlx::query_as("SELECT * FROM reminders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn delete_by_id(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
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
            remind_at: super::parse_datetime(&row.remind_at)?,
            created_at: super::parse_datetime(&row.created_at)?,
            scheduler_handle: row.scheduler_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::task_repository::SqliteTaskRepository;
    use crate::domain::models::task::{NewTaskFields, Task};
    use crate::domain::ports::TaskRepository;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn delete_all_for_task_returns_deleted_rows() {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = SqliteTaskRepository::new(pool.clone());
        let reminders = SqliteReminderRepository::new(pool);

        let task = Task::new(
            "u1".to_string(),
            NewTaskFields {
                title: "t".to_string(),
                description: None,
                priority: None,
                tags: BTreeSet::new(),
                due_at: None,
                is_recurring: false,
                recurrence_rule: None,
            },
        )
        .unwrap();
        tasks.create(&task).await.unwrap();

        let reminder = Reminder {
            id: Uuid::new_v4(),
            task_id: task.id,
            user_id: "u1".to_string(),
            remind_at: chrono::Utc::now() + chrono::Duration::seconds(60),
            created_at: chrono::Utc::now(),
            scheduler_handle: "h1".to_string(),
        };
        reminders.create(&reminder).await.unwrap();

        let deleted = reminders.delete_all_for_task("u1", task.id).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(reminders.list_for_task("u1", task.id).await.unwrap().is_empty());
    }
}
