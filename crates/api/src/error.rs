use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use runbook_core::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for engine errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON
/// error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An engine error from `runbook-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A missing, malformed, or invalid session token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A missing resource not covered by a core variant.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("executable {id} not found"),
                ),
                CoreError::NoSession => (
                    StatusCode::NOT_FOUND,
                    "NO_SESSION",
                    "no active session".to_string(),
                ),
                // Wrong-target-kind requests, rejected before any spawn.
                CoreError::Authorization(msg) => {
                    (StatusCode::BAD_REQUEST, "TARGET_REJECTED", msg.clone())
                }
                CoreError::Configuration(msg) => {
                    (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR", msg.clone())
                }
                CoreError::Template(msg) => {
                    (StatusCode::BAD_REQUEST, "TEMPLATE_ERROR", msg.clone())
                }
                CoreError::Interpreter { .. }
                | CoreError::Process(_)
                | CoreError::Capture(_)
                | CoreError::Io(_) => {
                    tracing::error!(error = %core, "engine error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response =
            AppError::Core(CoreError::NotFound("abc".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn authorization_maps_to_400() {
        let response =
            AppError::Core(CoreError::Authorization("nope".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn no_session_maps_to_404() {
        let response = AppError::Core(CoreError::NoSession).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let response = AppError::Unauthorized("missing token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
