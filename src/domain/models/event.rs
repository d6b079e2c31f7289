//! CloudEvents-style envelope shared by every topic on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const TOPIC_TASK_EVENTS: &str = "task-events";
pub const TOPIC_REMINDERS: &str = "reminders";
pub const TOPIC_TASK_UPDATES: &str = "task-updates";

pub const TYPE_TASK_LIFECYCLE: &str = "com.todo.task.lifecycle";
pub const TYPE_REMINDER_TRIGGER: &str = "com.todo.reminder.trigger";
pub const TYPE_TASK_UPDATE: &str = "com.todo.task.update";

/// A CloudEvents-shaped envelope. `data` is kept untyped so unknown fields
/// survive round-trips through consumers that only care about a subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub specversion: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub datacontenttype: String,
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: Value) -> Self {
        Self {
            specversion: "1.0".to_string(),
            event_type: event_type.into(),
            source: source.into(),
            id: Uuid::new_v4(),
            time: Utc::now(),
            datacontenttype: "application/json".to_string(),
            data,
        }
    }
}

/// A row read back off the embedded bus, carrying its delivery position.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub seq: i64,
    pub topic: String,
    pub envelope: EventEnvelope,
}
