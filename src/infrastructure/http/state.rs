//! Hand-wired application state passed into every handler (§9: no DI container).

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::domain::ports::AuditRepository;
use crate::services::{TaskService, TokenVerifier};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tasks: Arc<TaskService>,
    pub audit: Arc<dyn AuditRepository>,
    pub verifier: Arc<TokenVerifier>,
    pub internal_secret: String,
    pub callback_base_url: String,
}
