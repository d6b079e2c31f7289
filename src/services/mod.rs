//! Application services: the Task API's orchestration layer plus the three
//! background consumers and the two embedded infrastructure workers.

pub mod audit_consumer;
pub mod auth;
pub mod consumer_loop;
pub mod internal_client;
pub mod notification_consumer;
pub mod outbox_dispatcher;
pub mod recurrence;
pub mod recurring_regenerator;
pub mod scheduler;
pub mod task_service;

pub use auth::{Claims, TokenVerifier};
pub use internal_client::TaskApiClient;
pub use task_service::TaskService;
