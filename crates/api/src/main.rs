use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runbook_api::config::ServerConfig;
use runbook_api::state::AppState;
use runbook_api::{build_router, watcher};
use runbook_core::markup;
use runbook_core::mode::{ExecutionMode, ModeController};
use runbook_core::registry::ExecutableRegistry;
use runbook_core::session::SessionManager;
use runbook_events::StreamRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "runbook_api=debug,runbook_core=debug,runbook_events=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        runbook = %config.runbook_path.display(),
        mode = config.mode.as_str(),
        "Loaded server configuration"
    );

    // --- Mode controller (registry built once, at startup) ---
    let controller = build_controller(&config);

    // --- File watcher (live and watch modes only) ---
    let watch = config
        .mode
        .watches_file()
        .then(|| watcher::spawn(config.runbook_path.clone()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        session: Arc::new(SessionManager::new()),
        controller: Arc::new(controller),
        streams: Arc::new(StreamRegistry::new()),
        watch,
    };

    let app = build_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Build the mode controller. Registry modes parse the runbook once
/// here; whatever the file says later never changes what is runnable.
fn build_controller(config: &ServerConfig) -> ModeController {
    match config.mode {
        ExecutionMode::LiveReload => {
            ModeController::new(config.mode, &config.runbook_path, None)
        }
        ExecutionMode::RegistryValidated | ExecutionMode::WatchNoReload => {
            let extracted = markup::extract_from_file(&config.runbook_path)
                .expect("Failed to read runbook");
            let base_dir = config
                .runbook_path
                .parent()
                .unwrap_or_else(|| Path::new("."));
            let registry = ExecutableRegistry::build(extracted, base_dir);
            for warning in registry.warnings() {
                tracing::warn!(%warning, "registry warning");
            }
            tracing::info!(executables = registry.len(), "Executable registry built");
            ModeController::new(config.mode, &config.runbook_path, Some(Arc::new(registry)))
        }
    }
    .expect("Invalid mode configuration")
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
