//! Recurring Regenerator: creates the next occurrence when a recurring task
//! completes (§4.5), via an internal call to the Task API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::event::{EventEnvelope, TOPIC_TASK_EVENTS};
use crate::domain::models::task::Task;
use crate::domain::ports::{EventBus, ProcessedEventRepository};
use crate::services::consumer_loop::{self, ConsumerEffect};
use crate::services::internal_client::TaskApiClient;
use crate::services::recurrence::next_occurrence;

/// A completed task is eligible for regeneration only if it is itself marked
/// recurring, carries a recurrence rule, and the completion actually landed.
fn should_regenerate(task: &Task) -> bool {
    task.is_recurring && task.completed && task.recurrence_rule.is_some()
}

struct RecurringEffect {
    client: TaskApiClient,
}

#[async_trait]
impl ConsumerEffect for RecurringEffect {
    async fn handle(&self, envelope: &EventEnvelope, _tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> DomainResult<()> {
        if envelope.data.get("event_type").and_then(|v| v.as_str()) != Some("completed") {
            return Ok(());
        }
        let Some(task_data) = envelope.data.get("task_data") else {
            return Ok(());
        };
        let Ok(task) = serde_json::from_value::<Task>(task_data.clone()) else {
            return Ok(());
        };
        if !should_regenerate(&task) {
            return Ok(());
        }
        let rule = task.recurrence_rule.expect("checked by should_regenerate");

        let base: DateTime<Utc> = task.due_at.unwrap_or(task.updated_at);
        let next_due = next_occurrence(base, rule);

        self.client.create_recurring_successor(&task.user_id, &task, next_due).await
    }
}

pub async fn run(
    bus: Arc<dyn EventBus>,
    pool: SqlitePool,
    client: TaskApiClient,
    processed: Arc<dyn ProcessedEventRepository>,
    poll_interval: Duration,
) -> ! {
    consumer_loop::run(
        bus,
        pool,
        TOPIC_TASK_EVENTS,
        "recurring",
        processed,
        poll_interval,
        Arc::new(RecurringEffect { client }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::{NewTaskFields, RecurrenceRule};
    use std::collections::BTreeSet;

    fn task_with(is_recurring: bool, completed: bool, rule: Option<RecurrenceRule>) -> Task {
        let mut task = Task::new(
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
        task.is_recurring = is_recurring;
        task.completed = completed;
        task.recurrence_rule = rule;
        task
    }

    #[test]
    fn one_shot_completed_tasks_are_not_regenerated() {
        assert!(!should_regenerate(&task_with(false, true, None)));
    }

    #[test]
    fn incomplete_recurring_tasks_are_not_regenerated() {
        assert!(!should_regenerate(&task_with(true, false, Some(RecurrenceRule::Daily))));
    }

    #[test]
    fn recurring_task_missing_a_rule_is_not_regenerated() {
        assert!(!should_regenerate(&task_with(true, true, None)));
    }

    #[test]
    fn completed_recurring_task_with_a_rule_is_regenerated() {
        assert!(should_regenerate(&task_with(true, true, Some(RecurrenceRule::Weekly))));
    }
}
