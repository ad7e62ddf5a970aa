//! Engine error taxonomy.
//!
//! Script failures (non-zero exit codes) are *not* errors; they are
//! modeled outcomes classified in [`crate::exec::outcome`]. The variants
//! here cover everything that goes wrong before, around, or instead of a
//! normal script run.

/// Errors produced by the runbook execution engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A declared block's script source could not be resolved.
    ///
    /// At registry-build time this is recovered as a warning and the
    /// block is omitted; it only surfaces as an error from on-demand
    /// (live-reload) resolution.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request targets an id the active mode's resolution path does
    /// not accept. Rejected before any process is spawned.
    #[error("Authorization rejected: {0}")]
    Authorization(String),

    /// No executable with the given id is known to the resolver.
    #[error("Executable not found: {0}")]
    NotFound(String),

    /// The detected interpreter could not be located or launched.
    #[error("Interpreter '{interpreter}' could not be launched: {source}")]
    Interpreter {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    /// The child process failed to spawn for a non-interpreter reason
    /// (permissions, resource exhaustion, ...).
    #[error("Failed to spawn process: {0}")]
    Process(#[source] std::io::Error),

    /// The environment dump left by the capture launcher is malformed,
    /// truncated, or missing. Recovered by leaving the session's prior
    /// state untouched.
    #[error("Environment capture failed: {0}")]
    Capture(String),

    /// Template rendering failed.
    #[error("Template rendering failed: {0}")]
    Template(String),

    /// No active session exists for this server process.
    #[error("No active session")]
    NoSession,

    /// An I/O error while preparing or cleaning up an execution.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the engine.
pub type CoreResult<T> = Result<T, CoreError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
