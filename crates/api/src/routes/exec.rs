//! Execution endpoints: submit, stream, cancel.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use runbook_core::exec::{self, ExecutionConfig};
use runbook_core::mode::ExecTarget;
use runbook_core::session::EnvMap;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    /// Registry-issued id; registry and watch modes.
    pub executable_id: Option<String>,
    /// Author-supplied component id; live mode.
    pub component_id: Option<String>,
    #[serde(default)]
    pub template_var_values: HashMap<String, String>,
    /// Per-request credential overrides, applied on top of the session
    /// environment for this execution only.
    #[serde(default)]
    pub env_vars_override: HashMap<String, String>,
}

#[derive(Serialize)]
pub struct ExecResponse {
    pub execution_id: Uuid,
}

/// POST /api/exec -- resolve the target for the active mode and start
/// the script in a background task. Returns immediately; progress flows
/// through the stream endpoint.
async fn submit(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Json(request): Json<ExecRequest>,
) -> AppResult<Json<ExecResponse>> {
    let target = match (request.executable_id, request.component_id) {
        (Some(id), None) => ExecTarget::Executable(id.into()),
        (None, Some(component_id)) => ExecTarget::Component(component_id),
        _ => {
            return Err(AppError::BadRequest(
                "provide exactly one of executable_id or component_id".into(),
            ));
        }
    };

    // Resolution failures surface here, before anything is spawned.
    let executable = state.controller.resolve(&target)?;

    let cancel = CancellationToken::new();
    let (execution_id, events) = state.streams.register(cancel.clone());

    let exec_config = ExecutionConfig {
        output_dir: state.config.output_dir.clone(),
        workspace_dir: state.config.workspace_dir.clone(),
        timeout: state.config.exec_timeout,
    };
    let session = Arc::clone(&state.session);
    let template_values = request.template_var_values;
    let overrides: EnvMap = request.env_vars_override.into_iter().collect();

    tokio::spawn(async move {
        if let Err(err) = exec::execute(
            &executable,
            &template_values,
            &overrides,
            &session,
            &exec_config,
            events,
            cancel,
        )
        .await
        {
            // Already reported to subscribers as warning + result.
            tracing::error!(%execution_id, error = %err, "execution failed");
        }
    });

    Ok(Json(ExecResponse { execution_id }))
}

/// GET /api/exec/{id}/stream -- SSE of the execution's events. Replays
/// history first, then follows live; a finished execution just replays
/// and closes.
async fn stream(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let subscription = state
        .streams
        .subscribe(&id)
        .ok_or_else(|| AppError::NotFound(format!("execution {id} not found")))?;

    let replay = stream::iter(
        subscription
            .replay
            .into_iter()
            .map(|event| Event::default().json_data(&event)),
    );
    let live: BoxStream<'static, Result<Event, axum::Error>> = match subscription.live {
        Some(receiver) => BroadcastStream::new(receiver)
            .filter_map(|result| futures::future::ready(result.ok()))
            .map(|event| Event::default().json_data(&event))
            .boxed(),
        None => stream::empty().boxed(),
    };

    Ok(Sse::new(replay.chain(live)).keep_alive(KeepAlive::default()))
}

/// POST /api/exec/{id}/cancel -- fire the execution's cancellation
/// token. Idempotent; cancelling a finished execution is a no-op.
async fn cancel(
    State(state): State<AppState>,
    _auth: SessionAuth,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.streams.cancel(&id) {
        return Err(AppError::NotFound(format!("execution {id} not found")));
    }
    tracing::info!(execution_id = %id, "cancellation requested");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exec", post(submit))
        .route("/exec/{id}/stream", get(stream))
        .route("/exec/{id}/cancel", post(cancel))
}
