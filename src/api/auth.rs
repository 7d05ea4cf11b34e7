//! Request identity.
//!
//! Authentication proper is handled upstream; the gateway forwards the
//! caller's id in `x-user-id`. Admin routes additionally require the
//! configured `x-admin-token`.

use crate::api::AppState;
use crate::domain::UserId;
use crate::error::AppError;
use crate::ratelimit::RateLimitPreset;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

pub const USER_HEADER: &str = "x-user-id";
pub const ADMIN_HEADER: &str = "x-admin-token";

/// The calling user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_HEADER)))?;
        Ok(AuthUser(UserId::new(user)))
    }
}

/// Proof the caller presented the admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented.is_empty() || presented != state.config.admin_token {
            return Err(AppError::Forbidden("admin token required".to_string()));
        }
        Ok(AdminAuth)
    }
}

/// Count a request against `preset`, rejecting once the window is spent.
pub fn throttle(state: &AppState, key: &str, preset: RateLimitPreset) -> Result<(), AppError> {
    let decision = state.limiter.check(key, preset);
    if decision.allowed {
        return Ok(());
    }
    let retry_after_secs = decision.retry_after_secs(state.limiter.now());
    warn!(key, preset = preset.name(), retry_after_secs, "rate limit exceeded");
    Err(AppError::RateLimited { retry_after_secs })
}
