//! Runbook change notifications.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/watch -- SSE of file-change notifications. Available in
/// live and watch modes; registry mode has no watcher. Change events
/// only tell the UI to refresh its display; the set of runnable
/// executables never changes.
async fn watch(
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let sender = state.watch.as_ref().ok_or_else(|| {
        AppError::NotFound("file watching is not enabled in registry mode".into())
    })?;

    let changes = BroadcastStream::new(sender.subscribe())
        .filter_map(|result| futures::future::ready(result.ok()))
        .map(|change| Event::default().json_data(&change));

    Ok(Sse::new(changes).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/watch", get(watch))
}
