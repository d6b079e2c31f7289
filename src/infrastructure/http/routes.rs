//! Route handlers for the Task API's HTTP surface (§6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::audit_entry::{AuditFilter, TaskEventType};
use crate::domain::models::reminder::Reminder;
use crate::domain::models::task::{NewTaskFields, Task, TaskPatch};
use crate::domain::ports::task_repository::{SortField, SortOrder, TaskFilter, TaskStatusFilter};
use crate::infrastructure::http::auth::{AuthUser, InternalCaller};
use crate::infrastructure::http::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/{user_id}/tasks", post(create_task).get(list_tasks))
        .route("/api/{user_id}/tasks/{task_id}", get(get_task).put(update_task).delete(delete_task))
        .route("/api/{user_id}/tasks/{task_id}/complete", patch(toggle_complete))
        .route(
            "/api/{user_id}/tasks/{task_id}/reminders",
            post(create_reminder).get(list_reminders),
        )
        .route("/api/{user_id}/tasks/{task_id}/reminders/{reminder_id}", delete(delete_reminder))
        .route("/api/{user_id}/audit", get(list_audit))
        .route("/internal/jobs/reminder-trigger", post(scheduler_fire))
        .route("/internal/users/{user_id}/tasks", post(internal_create_task))
        .with_state(state)
}

/// A path `user_id` that doesn't match the bearer token's subject is reported
/// as 404, not 403 — matching the path of an owned resource shouldn't leak
/// whether a task under a *different* user exists.
fn require_same_user(auth: &AuthUser, path_user_id: &str) -> DomainResult<()> {
    if auth.0 != path_user_id {
        return Err(DomainError::NotFound);
    }
    Ok(())
}

async fn healthz(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Json(fields): Json<NewTaskFields>,
) -> DomainResult<(StatusCode, Json<Task>)> {
    require_same_user(&auth, &user_id)?;
    let task = state.tasks.create_task(&user_id, fields).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListTasksQuery {
    pub priority: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
    pub due_before: Option<chrono::DateTime<chrono::Utc>>,
    pub due_after: Option<chrono::DateTime<chrono::Utc>>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListTasksQuery {
    fn into_filter(self) -> DomainResult<TaskFilter> {
        let priority = self
            .priority
            .as_deref()
            .map(crate::domain::models::task::Priority::from_str_opt)
            .transpose()?;
        let tags = self
            .tags
            .map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let status = match self.status.as_deref() {
            None | Some("all") => None,
            Some("completed") => Some(TaskStatusFilter::Completed),
            Some("pending") => Some(TaskStatusFilter::Pending),
            Some(other) => {
                return Err(DomainError::ValidationFailed(format!("invalid status filter: {other}")))
            }
        };
        let sort_by = match self.sort_by.as_deref() {
            None => None,
            Some("created_at") => Some(SortField::CreatedAt),
            Some("due_at") => Some(SortField::DueAt),
            Some("priority") => Some(SortField::Priority),
            Some("title") => Some(SortField::Title),
            Some(other) => return Err(DomainError::ValidationFailed(format!("invalid sort_by: {other}"))),
        };
        let sort_order = match self.sort_order.as_deref() {
            None => None,
            Some("asc") => Some(SortOrder::Asc),
            Some("desc") => Some(SortOrder::Desc),
            Some(other) => return Err(DomainError::ValidationFailed(format!("invalid sort_order: {other}"))),
        };
        Ok(TaskFilter {
            priority,
            tags,
            status,
            due_before: self.due_before,
            due_after: self.due_after,
            search: self.search,
            sort_by,
            sort_order,
        })
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Query(query): Query<ListTasksQuery>,
) -> DomainResult<Json<Vec<Task>>> {
    require_same_user(&auth, &user_id)?;
    let filter = query.into_filter()?;
    let tasks = state.tasks.list_tasks(&user_id, &filter).await?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
) -> DomainResult<Json<Task>> {
    require_same_user(&auth, &user_id)?;
    let task = state.tasks.get_task(&user_id, task_id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
    Json(patch): Json<TaskPatch>,
) -> DomainResult<Json<Task>> {
    require_same_user(&auth, &user_id)?;
    let task = state.tasks.update_task(&user_id, task_id, patch).await?;
    Ok(Json(task))
}

async fn toggle_complete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
) -> DomainResult<Json<Task>> {
    require_same_user(&auth, &user_id)?;
    let task = state.tasks.toggle_complete(&user_id, task_id).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
) -> DomainResult<StatusCode> {
    require_same_user(&auth, &user_id)?;
    state.tasks.delete_task(&user_id, task_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderBody {
    pub remind_at: chrono::DateTime<chrono::Utc>,
}

async fn create_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
    Json(body): Json<CreateReminderBody>,
) -> DomainResult<(StatusCode, Json<Reminder>)> {
    require_same_user(&auth, &user_id)?;
    let reminder = state
        .tasks
        .create_reminder(&user_id, task_id, body.remind_at, &state.callback_base_url)
        .await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn list_reminders(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id)): Path<(String, Uuid)>,
) -> DomainResult<Json<Vec<Reminder>>> {
    require_same_user(&auth, &user_id)?;
    let reminders = state.tasks.list_reminders(&user_id, task_id).await?;
    Ok(Json(reminders))
}

async fn delete_reminder(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, task_id, reminder_id)): Path<(String, Uuid, Uuid)>,
) -> DomainResult<StatusCode> {
    require_same_user(&auth, &user_id)?;
    state.tasks.delete_reminder(&user_id, task_id, reminder_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize, Default)]
pub struct AuditQuery {
    pub task: Option<Uuid>,
    pub event_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn list_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Query(query): Query<AuditQuery>,
) -> DomainResult<Json<Vec<crate::domain::models::audit_entry::AuditEntry>>> {
    require_same_user(&auth, &user_id)?;
    let event_type = query
        .event_type
        .as_deref()
        .map(|s| TaskEventType::from_str_opt(s).ok_or_else(|| DomainError::ValidationFailed(format!("invalid event_type: {s}"))))
        .transpose()?;
    let limit = query.limit.unwrap_or(AuditFilter::DEFAULT_LIMIT).clamp(1, AuditFilter::MAX_LIMIT);
    let filter = AuditFilter {
        task_id: query.task,
        event_type,
        limit,
        offset: query.offset.unwrap_or(0).max(0),
    };
    let entries = state.audit.list(&user_id, &filter).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct SchedulerFireBody {
    pub reminder_id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
}

async fn scheduler_fire(
    State(state): State<AppState>,
    _internal: InternalCaller,
    Json(body): Json<SchedulerFireBody>,
) -> DomainResult<StatusCode> {
    state.tasks.on_scheduler_fire(body.reminder_id, body.task_id, &body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct InternalCreateTaskBody {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: std::collections::BTreeSet<String>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
}

async fn internal_create_task(
    State(state): State<AppState>,
    _internal: InternalCaller,
    Path(user_id): Path<String>,
    Json(body): Json<InternalCreateTaskBody>,
) -> DomainResult<(StatusCode, Json<Task>)> {
    let fields = NewTaskFields {
        title: body.title,
        description: body.description,
        priority: body.priority,
        tags: body.tags,
        due_at: body.due_at,
        is_recurring: body.is_recurring,
        recurrence_rule: body.recurrence_rule,
    };
    let task = state.tasks.create_task(&user_id, fields).await?;
    Ok((StatusCode::CREATED, Json(task)))
}
