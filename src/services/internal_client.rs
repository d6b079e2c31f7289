//! Internal (service-to-service) HTTP client the Recurring Regenerator uses
//! to invoke the Task API's `CreateTask` operation.

use serde::Serialize;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::task::Task;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Serialize)]
struct InternalCreateTaskBody {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    tags: std::collections::BTreeSet<String>,
    due_at: chrono::DateTime<chrono::Utc>,
    is_recurring: bool,
    recurrence_rule: Option<String>,
    completed: bool,
}

#[derive(Clone)]
pub struct TaskApiClient {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
}

impl TaskApiClient {
    pub fn new(base_url: impl Into<String>, internal_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builder never fails with these settings"),
            base_url: base_url.into(),
            internal_secret: internal_secret.into(),
        }
    }

    /// Creates the successor task for a completed recurring task. Internal invocation,
    /// authenticated with the shared internal secret rather than a user token.
    pub async fn create_recurring_successor(
        &self,
        user_id: &str,
        source: &Task,
        due_at: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<()> {
        let body = InternalCreateTaskBody {
            title: source.title.clone(),
            description: source.description.clone(),
            priority: source.priority.map(|p| p.as_str().to_string()),
            tags: source.tags.clone(),
            due_at,
            is_recurring: true,
            recurrence_rule: source.recurrence_rule.map(|r| r.as_str().to_string()),
            completed: false,
        };

        let url = format!("{}/internal/users/{}/tasks", self.base_url, user_id);
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&url)
                .header("X-Internal-Secret", &self.internal_secret)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(DomainError::ValidationFailed(format!(
                        "task API rejected recurring successor: {}",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    if attempt >= MAX_RETRIES {
                        return Err(DomainError::Unavailable(format!(
                            "task API returned {} after {} attempts",
                            resp.status(),
                            attempt + 1
                        )));
                    }
                }
                Err(err) => {
                    if attempt >= MAX_RETRIES {
                        return Err(DomainError::Unavailable(err.to_string()));
                    }
                }
            }
            attempt += 1;
        }
    }
}
