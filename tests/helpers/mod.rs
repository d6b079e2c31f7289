use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use sqlx::SqlitePool;

use todo_core::adapters::sqlite::{
    create_migrated_test_pool, SqliteAuditRepository, SqliteReminderRepository, SqliteTaskRepository,
};
use todo_core::infrastructure::http::{router, AppState};
use todo_core::services::{TaskService, TokenVerifier};

pub const JWT_SECRET: &str = "test-secret";
pub const INTERNAL_SECRET: &str = "test-internal-secret";

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: usize,
}

pub fn bearer_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub async fn test_app() -> (axum::Router, SqlitePool) {
    let pool = create_migrated_test_pool().await.unwrap();
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let reminders = Arc::new(SqliteReminderRepository::new(pool.clone()));
    let task_service = Arc::new(TaskService::new(pool.clone(), tasks, reminders));
    let audit = Arc::new(SqliteAuditRepository::new(pool.clone()));
    let verifier = Arc::new(TokenVerifier::new(JWT_SECRET));

    let state = AppState {
        pool: pool.clone(),
        tasks: task_service,
        audit,
        verifier,
        internal_secret: INTERNAL_SECRET.to_string(),
        callback_base_url: "http://127.0.0.1:8080".to_string(),
    };
    (router(state), pool)
}
