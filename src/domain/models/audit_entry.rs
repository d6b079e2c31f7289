//! Audit ledger entity, owned exclusively by the Audit Consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskEventType {
    Created,
    Updated,
    Completed,
    Deleted,
}

impl TaskEventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "completed" => Some(Self::Completed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: String,
    pub task_id: Uuid,
    pub event_type: TaskEventType,
    pub event_data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Filter for the Audit read-side query endpoint.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub task_id: Option<Uuid>,
    pub event_type: Option<TaskEventType>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;
}
