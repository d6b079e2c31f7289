//! Port for the topic-based Bus capability (§4.2).

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::event::{BusMessage, EventEnvelope};

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Appends a message to `topic`. Called by the outbox dispatcher, never directly
    /// by request handlers (see the write-then-publish protocol in §4.1).
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> DomainResult<()>;

    /// Polls the next unseen message for `(topic, consumer_group)`, in `seq` order.
    /// Does not advance the cursor; callers must `ack` after committing their effect.
    async fn poll_next(&self, topic: &str, consumer_group: &str) -> DomainResult<Option<BusMessage>>;

    /// Advances the consumer group's cursor past `seq`, making the message unobservable again.
    async fn ack(&self, topic: &str, consumer_group: &str, seq: i64) -> DomainResult<()>;
}
