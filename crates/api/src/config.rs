use std::path::PathBuf;
use std::time::Duration;

use runbook_core::mode::ExecutionMode;

/// Server configuration loaded from environment variables.
///
/// Everything except `RUNBOOK_PATH` has a default suitable for running
/// against a local runbook.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`; this is a local tool).
    pub host: String,
    /// Bind port (default: `7700`).
    pub port: u16,
    /// The runbook document to serve.
    pub runbook_path: PathBuf,
    /// Execution mode, fixed for the process lifetime.
    pub mode: ExecutionMode,
    /// Where promoted generated files land.
    pub output_dir: PathBuf,
    /// Optional shared workspace directory.
    pub workspace_dir: Option<PathBuf>,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Wall-clock limit per execution.
    pub exec_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default                       |
    /// |---------------------|-------------------------------|
    /// | `HOST`              | `127.0.0.1`                   |
    /// | `PORT`              | `7700`                        |
    /// | `RUNBOOK_PATH`      | (required)                    |
    /// | `RUNBOOK_MODE`      | `registry`                    |
    /// | `OUTPUT_DIR`        | `<runbook dir>/runbook-output`|
    /// | `WORKSPACE_DIR`     | (unset)                       |
    /// | `CORS_ORIGINS`      | `http://localhost:5173`       |
    /// | `EXEC_TIMEOUT_SECS` | `300`                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "7700".into())
            .parse()
            .expect("PORT must be a valid u16");

        let runbook_path =
            PathBuf::from(std::env::var("RUNBOOK_PATH").expect("RUNBOOK_PATH must be set"));

        let mode: ExecutionMode = std::env::var("RUNBOOK_MODE")
            .unwrap_or_else(|_| "registry".into())
            .parse()
            .expect("RUNBOOK_MODE must be registry, live, or watch");

        let output_dir = std::env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            runbook_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."))
                .join("runbook-output")
        });

        let workspace_dir = std::env::var("WORKSPACE_DIR").ok().map(PathBuf::from);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let exec_timeout_secs: u64 = std::env::var("EXEC_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("EXEC_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            runbook_path,
            mode,
            output_dir,
            workspace_dir,
            cors_origins,
            exec_timeout: Duration::from_secs(exec_timeout_secs),
        }
    }
}
