//! SQLite adapters implementing the domain ports.

pub mod audit_repository;
pub mod bus;
pub mod connection;
pub mod migrations;
pub mod outbox_repository;
pub mod processed_event_repository;
pub mod reminder_repository;
pub mod scheduled_job_repository;
pub mod task_repository;

pub use audit_repository::SqliteAuditRepository;
pub use bus::SqliteEventBus;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use outbox_repository::SqliteOutboxRepository;
pub use processed_event_repository::SqliteProcessedEventRepository;
pub use reminder_repository::SqliteReminderRepository;
pub use scheduled_job_repository::SqliteScheduledJobRepository;
pub use task_repository::SqliteTaskRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse a JSON string from a SQLite row field, falling back to the type's default.
pub fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: &str) -> DomainResult<T> {
    if s.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub async fn initialize_database(database_url: &str, max_connections: u32) -> Result<SqlitePool, DatabaseError> {
    let pool_config = PoolConfig {
        max_connections,
        ..PoolConfig::default()
    };
    let pool = create_pool(database_url, Some(pool_config)).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
