//! Bearer-token extractor. Cross-user access (token user ≠ path user) is
//! surfaced as 404, not 403, per §6's "no existence leak" rule — handlers
//! compare `AuthUser` against the path's `user_id` themselves.

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;

use crate::domain::errors::DomainError;
use crate::infrastructure::http::state::AppState;

pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = DomainError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let header = parts.headers.get(AUTHORIZATION).ok_or(DomainError::Unauthorized)?;
        let value = header.to_str().map_err(|_| DomainError::Unauthorized)?;
        let token = value.strip_prefix("Bearer ").ok_or(DomainError::Unauthorized)?;
        let user_id = app_state.verifier.verify(token)?;
        Ok(AuthUser(user_id))
    }
}

/// Internal callers (Scheduler, Recurring Regenerator) present a shared secret
/// instead of a user token (§4.1 `OnSchedulerFire`, §4.5).
pub struct InternalCaller;

#[async_trait]
impl<S> FromRequestParts<S> for InternalCaller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = DomainError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let header = parts
            .headers
            .get("X-Internal-Secret")
            .ok_or(DomainError::Unauthorized)?;
        let value = header.to_str().map_err(|_| DomainError::Unauthorized)?;
        if value != app_state.internal_secret || app_state.internal_secret.is_empty() {
            return Err(DomainError::Unauthorized);
        }
        Ok(InternalCaller)
    }
}
