//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::task::{Priority, RecurrenceRule, Task};
use crate::domain::ports::task_repository::{SortField, SortOrder, TaskFilter, TaskStatusFilter};
use crate::domain::ports::TaskRepository;

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
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
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: &str, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, user_id: &str, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut tasks = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DomainResult<Vec<Task>>>()?;

        apply_filter(&mut tasks, filter);
        sort_tasks(&mut tasks, filter);
        Ok(tasks)
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let tags_json = serde_json::to_string(&task.tags)?;

        let result = sqlx::query(
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
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn apply_filter(tasks: &mut Vec<Task>, filter: &TaskFilter) {
    tasks.retain(|t| {
        if let Some(p) = filter.priority {
            if t.priority != Some(p) {
                return false;
            }
        }
        if !filter.tags.is_empty() {
            let tag_set: BTreeSet<&str> = t.tags.iter().map(String::as_str).collect();
            if !filter.tags.iter().all(|tag| tag_set.contains(tag.as_str())) {
                return false;
            }
        }
        match filter.status {
            Some(TaskStatusFilter::Completed) if !t.completed => return false,
            Some(TaskStatusFilter::Pending) if t.completed => return false,
            _ => {}
        }
        if let Some(before) = filter.due_before {
            if !t.due_at.is_some_and(|d| d < before) {
                return false;
            }
        }
        if let Some(after) = filter.due_after {
            if !t.due_at.is_some_and(|d| d > after) {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            if !t.matches_search(search) {
                return false;
            }
        }
        true
    });
}

fn sort_tasks(tasks: &mut [Task], filter: &TaskFilter) {
    let order = filter.sort_order.unwrap_or(SortOrder::Asc);
    let field = filter.sort_by.unwrap_or(SortField::CreatedAt);

    tasks.sort_by(|a, b| {
        let primary = match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::DueAt => match (a.due_at, b.due_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            },
            SortField::Priority => {
                let rank = |p: Option<Priority>| p.map_or(u8::MAX, Priority::rank);
                rank(a.priority).cmp(&rank(b.priority))
            }
        };
        let primary = if order == SortOrder::Desc { primary.reverse() } else { primary };
        // due_at null-last always wins over sort direction; re-apply regardless of order.
        let primary = if field == SortField::DueAt {
            match (a.due_at, b.due_at) {
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                _ => primary,
            }
        } else {
            primary
        };
        primary.then_with(|| b.created_at.cmp(&a.created_at))
    });
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    completed: bool,
    priority: Option<String>,
    tags: String,
    due_at: Option<String>,
    is_recurring: bool,
    recurrence_rule: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let priority = row.priority.as_deref().map(Priority::from_str_opt).transpose()?;
        let recurrence_rule = row
            .recurrence_rule
            .as_deref()
            .map(RecurrenceRule::from_str_opt)
            .transpose()?;
        let tags: BTreeSet<String> = super::parse_json_or_default(&row.tags)?;

        Ok(Task {
            id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            priority,
            tags,
            due_at: row.due_at.map(|s| super::parse_datetime(&s)).transpose()?,
            is_recurring: row.is_recurring,
            recurrence_rule,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::task::NewTaskFields;

    async fn repo() -> SqliteTaskRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    fn new_task(user: &str, title: &str) -> Task {
        Task::new(
            user.to_string(),
            NewTaskFields {
                title: title.to_string(),
                description: None,
                priority: None,
                tags: BTreeSet::new(),
                due_at: None,
                is_recurring: false,
                recurrence_rule: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = repo().await;
        let task = new_task("u1", "Groceries");
        repo.create(&task).await.unwrap();

        let fetched = repo.get("u1", task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Groceries");
        assert!(!fetched.completed);
    }

    #[tokio::test]
    async fn cross_user_get_returns_none() {
        let repo = repo().await;
        let task = new_task("u1", "Groceries");
        repo.create(&task).await.unwrap();

        assert!(repo.get("u2", task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sorts_due_at_nulls_last() {
        let repo = repo().await;
        let now = chrono::Utc::now();

        let mut today = new_task("u1", "today");
        today.due_at = Some(now);
        let mut tomorrow = new_task("u1", "tomorrow");
        tomorrow.due_at = Some(now + chrono::Duration::days(1));
        let none = new_task("u1", "none");

        repo.create(&today).await.unwrap();
        repo.create(&tomorrow).await.unwrap();
        repo.create(&none).await.unwrap();

        let filter = TaskFilter {
            sort_by: Some(SortField::DueAt),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let listed = repo.list("u1", &filter).await.unwrap();
        assert_eq!(
            listed.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["today", "tomorrow", "none"]
        );
    }
}
