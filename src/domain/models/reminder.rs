//! Reminder entity: a future-timestamped fire-and-forget job tied to a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub scheduler_handle: String,
}

impl Reminder {
    /// Validate `remind_at` is strictly in the future relative to `now`.
    pub fn validate_remind_at(remind_at: DateTime<Utc>, now: DateTime<Utc>) -> DomainResult<()> {
        if remind_at <= now {
            return Err(DomainError::ValidationFailed(
                "remind_at must be in the future".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn remind_at_boundaries() {
        let now = Utc::now();
        assert!(Reminder::validate_remind_at(now - Duration::milliseconds(1), now).is_err());
        assert!(Reminder::validate_remind_at(now + Duration::milliseconds(1), now).is_ok());
    }
}
