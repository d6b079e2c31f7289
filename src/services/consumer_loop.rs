//! Shared poll/dedup/ack loop for the Audit, Notification, and Recurring consumers.
//!
//! Each consumer group provides a [`ConsumerEffect`]; this module owns the
//! at-least-once polling, idempotency check, ack, and dead-letter routing
//! that would otherwise be copy-pasted three times.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::event::EventEnvelope;
use crate::domain::ports::{EventBus, ProcessedEventRepository};

#[async_trait]
pub trait ConsumerEffect: Send + Sync {
    /// Runs inside the same store transaction as the dedup mark, so a failed
    /// effect rolls back any writes it made and the caller's mark-processed
    /// insert is never committed. Effects with no transactional writes of
    /// their own (an HTTP call, a log line) can ignore `tx`.
    async fn handle(&self, envelope: &EventEnvelope, tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>)
        -> DomainResult<()>;
}

/// Consecutive handler failures for the same message before it is dead-lettered
/// and skipped, so one poison message cannot wedge a consumer group forever.
const DEAD_LETTER_THRESHOLD: u32 = 5;

pub async fn run(
    bus: Arc<dyn EventBus>,
    pool: SqlitePool,
    topic: &'static str,
    consumer_group: &'static str,
    processed: Arc<dyn ProcessedEventRepository>,
    poll_interval: Duration,
    effect: Arc<dyn ConsumerEffect>,
) -> ! {
    let mut failures: HashMap<i64, u32> = HashMap::new();
    loop {
        match bus.poll_next(topic, consumer_group).await {
            Ok(Some(msg)) => match processed.is_processed(msg.envelope.id).await {
                Ok(true) => {
                    // Already processed by an earlier delivery of the same event id;
                    // advance past it without redoing the effect.
                    let _ = bus.ack(topic, consumer_group, msg.seq).await;
                }
                Ok(false) => {
                    match run_once(&pool, &*processed, &*effect, &msg.envelope).await {
                        Ok(()) => {
                            failures.remove(&msg.seq);
                            if let Err(e) = bus.ack(topic, consumer_group, msg.seq).await {
                                tracing::error!(topic, consumer_group, error = %e, "failed to ack");
                            }
                        }
                        Err(e) => {
                            let count = failures.entry(msg.seq).or_insert(0);
                            *count += 1;
                            tracing::warn!(
                                topic, consumer_group, seq = msg.seq, attempt = *count, error = %e,
                                "consumer effect failed"
                            );
                            if *count >= DEAD_LETTER_THRESHOLD {
                                dead_letter(&pool, topic, consumer_group, &msg.envelope, &e.to_string()).await;
                                failures.remove(&msg.seq);
                                let _ = bus.ack(topic, consumer_group, msg.seq).await;
                            }
                            // Otherwise: don't ack. The message is redelivered and, since
                            // the dedup mark never committed, the effect runs again.
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(topic, consumer_group, error = %e, "dedup check failed");
                }
            },
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                tracing::error!(topic, consumer_group, error = %e, "poll failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Runs the effect and the dedup mark in one transaction: the mark is only
/// inserted after the effect succeeds, and both commit together. A failing
/// effect drops `tx` (rolling back any writes it made) without marking the
/// event processed, so redelivery re-runs it.
async fn run_once(
    pool: &SqlitePool,
    processed: &dyn ProcessedEventRepository,
    effect: &dyn ConsumerEffect,
    envelope: &EventEnvelope,
) -> DomainResult<()> {
    let mut tx = pool.begin().await?;
    effect.handle(envelope, &mut tx).await?;
    processed.mark_processed_tx(&mut tx, envelope.id).await?;
    tx.commit().await?;
    Ok(())
}

async fn dead_letter(
    pool: &SqlitePool,
    topic: &str,
    consumer_group: &str,
    envelope: &EventEnvelope,
    reason: &str,
) {
    let Ok(envelope_json) = serde_json::to_string(envelope) else {
        return;
    };
    let result = sqlx::query(
        r#"INSERT INTO dead_letters (id, topic, consumer_group, envelope, failure_reason, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(topic)
    .bind(consumer_group)
    .bind(&envelope_json)
    .bind(reason)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "failed to record dead letter");
    }
}
