//! HTTP route modules, one per API area.

pub mod exec;
pub mod executables;
pub mod health;
pub mod session;
pub mod watch;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(session::router())
        .merge(executables::router())
        .merge(exec::router())
        .merge(watch::router())
}
