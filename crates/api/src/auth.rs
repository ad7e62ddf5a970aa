//! Session-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// A validated session token from the `Authorization: Bearer` header.
///
/// Use as an extractor parameter in any handler that requires a
/// session. Tokens gate script execution even though the server only
/// listens on loopback; without one, any local process could drive the
/// API.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub token: String,
}

impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Missing Authorization header".into())
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            )
        })?;

        if !state.session.validate_token(token) {
            return Err(AppError::Unauthorized("Invalid session token".into()));
        }

        Ok(SessionAuth {
            token: token.to_string(),
        })
    }
}
