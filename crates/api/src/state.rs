use std::sync::Arc;

use tokio::sync::broadcast;

use runbook_core::mode::ModeController;
use runbook_core::session::SessionManager;
use runbook_events::StreamRegistry;

use crate::config::ServerConfig;
use crate::watcher::RunbookChange;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The single persistent session.
    pub session: Arc<SessionManager>,
    /// Mode-aware execution target resolution.
    pub controller: Arc<ModeController>,
    /// Per-execution event streams.
    pub streams: Arc<StreamRegistry>,
    /// File-change notifications; present in live and watch modes only.
    pub watch: Option<broadcast::Sender<RunbookChange>>,
}
