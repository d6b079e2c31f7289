//! Embedded Scheduler worker: fires due reminder callbacks (§4.6).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use uuid::Uuid;

use crate::domain::ports::ScheduledJobRepository;

pub async fn run(
    jobs: Arc<dyn ScheduledJobRepository>,
    poll_interval: Duration,
    batch_size: u32,
    retry_cap: u32,
) -> ! {
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client builder never fails with these settings");

    loop {
        match jobs.claim_due(Utc::now(), batch_size).await {
            Ok(due) => {
                for job in due {
                    let result = client.post(&job.url).json(&job.payload).send().await;
                    match result {
                        Ok(resp) if resp.status().is_success() => {
                            if let Err(e) = jobs.mark_fired(job.id).await {
                                tracing::error!(job_id = %job.id, error = %e, "failed to mark job fired");
                            }
                        }
                        Ok(resp) => {
                            tracing::warn!(job_id = %job.id, status = %resp.status(), "scheduler callback rejected");
                            record_failure(&jobs, job.id, retry_cap).await;
                        }
                        Err(e) => {
                            tracing::warn!(job_id = %job.id, error = %e, "scheduler callback failed");
                            record_failure(&jobs, job.id, retry_cap).await;
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to claim due jobs"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn record_failure(jobs: &Arc<dyn ScheduledJobRepository>, id: Uuid, retry_cap: u32) {
    match jobs.record_failure(id).await {
        Ok(attempts) if attempts >= retry_cap => {
            tracing::error!(job_id = %id, attempts, "job exceeded retry cap, still retrying on next poll");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(job_id = %id, error = %e, "failed to record job failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteScheduledJobRepository};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn a_due_job_is_claimed_fired_and_marked_complete() {
        let pool = create_migrated_test_pool().await.unwrap();
        let jobs: Arc<dyn ScheduledJobRepository> = Arc::new(SqliteScheduledJobRepository::new(pool.clone()));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/jobs/reminder-trigger"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = format!("{}/internal/jobs/reminder-trigger", server.uri());
        jobs.schedule(Utc::now() - chrono::Duration::seconds(1), &url, serde_json::json!({}))
            .await
            .unwrap();

        let due = jobs.claim_due(Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);

        let client = Client::new();
        let resp = client.post(&due[0].url).json(&due[0].payload).send().await.unwrap();
        assert!(resp.status().is_success());
        jobs.mark_fired(due[0].id).await.unwrap();

        assert!(jobs.claim_due(Utc::now(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_future_job_is_not_claimed() {
        let pool = create_migrated_test_pool().await.unwrap();
        let jobs: Arc<dyn ScheduledJobRepository> = Arc::new(SqliteScheduledJobRepository::new(pool.clone()));
        jobs.schedule(Utc::now() + chrono::Duration::hours(1), "http://unused", serde_json::json!({}))
            .await
            .unwrap();

        assert!(jobs.claim_due(Utc::now(), 10).await.unwrap().is_empty());
    }
}
