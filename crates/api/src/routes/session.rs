//! Session lifecycle endpoints.
//!
//! `create` and `join` are unauthenticated (they are how a tab obtains
//! a token); everything else requires a valid bearer token. Environment
//! contents never appear in any response.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Serialize;

use runbook_core::session::SessionMetadata;
use runbook_core::CoreError;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionTokenResponse {
    pub token: String,
}

/// POST /api/session -- create the session (replacing any existing one,
/// which invalidates all prior tokens). Seeded from the server's
/// environment and the runbook's directory.
async fn create_session(
    State(state): State<AppState>,
) -> AppResult<Json<SessionTokenResponse>> {
    let working_dir = state
        .config
        .runbook_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    let token = state.session.create(&working_dir)?;
    tracing::info!(working_dir = %working_dir.display(), "session created");
    Ok(Json(SessionTokenResponse { token }))
}

/// POST /api/session/join -- a new tab joins the existing session with
/// its own token. 404 when no session exists yet.
async fn join_session(State(state): State<AppState>) -> AppResult<Json<SessionTokenResponse>> {
    let token = state.session.join()?;
    Ok(Json(SessionTokenResponse { token }))
}

/// GET /api/session -- public-safe metadata, no environment values.
async fn get_session(
    State(state): State<AppState>,
    _auth: SessionAuth,
) -> AppResult<Json<SessionMetadata>> {
    let metadata = state
        .session
        .metadata()
        .ok_or(AppError::Core(CoreError::NoSession))?;
    Ok(Json(metadata))
}

/// POST /api/session/reset -- restore the creation-time environment and
/// working directory.
async fn reset_session(State(state): State<AppState>, _auth: SessionAuth) -> AppResult<StatusCode> {
    state.session.reset()?;
    tracing::info!("session reset to initial state");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/session -- drop the session and invalidate every token.
async fn delete_session(State(state): State<AppState>, _auth: SessionAuth) -> StatusCode {
    state.session.delete();
    tracing::info!("session deleted");
    StatusCode::NO_CONTENT
}

/// DELETE /api/session/token -- revoke the caller's own token (tab
/// close), leaving the session and other tabs intact.
async fn revoke_token(State(state): State<AppState>, auth: SessionAuth) -> StatusCode {
    state.session.revoke_token(&auth.token);
    StatusCode::NO_CONTENT
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(create_session).get(get_session).delete(delete_session),
        )
        .route("/session/join", post(join_session))
        .route("/session/reset", post(reset_session))
        .route("/session/token", delete(revoke_token))
}
