//! Registry metadata endpoint.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use runbook_core::registry::ExecutableMeta;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ExecutablesResponse {
    pub mode: &'static str,
    /// Metadata only; script content is never exposed.
    pub executables: Vec<ExecutableMeta>,
    /// Warnings collected while building the registry.
    pub warnings: Vec<String>,
}

/// GET /api/runbook/executables -- what the runbook declares.
///
/// Live mode has no registry; it answers with empty lists so the UI can
/// tell "nothing registered" from "registry mode with no blocks" by the
/// mode field.
async fn list_executables(State(state): State<AppState>) -> Json<ExecutablesResponse> {
    let mode = state.config.mode.as_str();
    match state.controller.registry() {
        Some(registry) => Json(ExecutablesResponse {
            mode,
            executables: registry.list(),
            warnings: registry.warnings().to_vec(),
        }),
        None => Json(ExecutablesResponse {
            mode,
            executables: Vec::new(),
            warnings: Vec::new(),
        }),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/runbook/executables", get(list_executables))
}
