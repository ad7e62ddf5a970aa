//! Execution modes.
//!
//! The mode is fixed at process start and decides how an execution
//! request is resolved to a script. The two registry-backed modes only
//! accept opaque registry ids against the startup-built whitelist; live
//! mode (for runbook authors) accepts component ids and re-reads the
//! document from disk on every request. Watch mode's file notifications
//! are purely a display concern; they never touch the registry.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::markup;
use crate::registry::{Executable, ExecutableId, ExecutableRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Default: execute only registry-validated executables.
    RegistryValidated,
    /// Author mode: re-parse the runbook per request, no registry.
    LiveReload,
    /// Registry semantics plus file-change notifications for the UI.
    WatchNoReload,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::RegistryValidated => "registry",
            ExecutionMode::LiveReload => "live",
            ExecutionMode::WatchNoReload => "watch",
        }
    }

    /// Whether this mode runs the file-change watcher.
    pub fn watches_file(self) -> bool {
        matches!(self, ExecutionMode::LiveReload | ExecutionMode::WatchNoReload)
    }
}

impl FromStr for ExecutionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(ExecutionMode::RegistryValidated),
            "live" => Ok(ExecutionMode::LiveReload),
            "watch" => Ok(ExecutionMode::WatchNoReload),
            other => Err(CoreError::Configuration(format!(
                "unknown execution mode '{other}' (expected registry, live, or watch)"
            ))),
        }
    }
}

/// What an execution request names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    /// Opaque registry-issued id; registry modes only.
    Executable(ExecutableId),
    /// Author-supplied component id; live mode only.
    Component(String),
}

/// Resolves execution targets according to the process-wide mode.
#[derive(Debug)]
pub struct ModeController {
    mode: ExecutionMode,
    runbook_path: PathBuf,
    registry: Option<Arc<ExecutableRegistry>>,
}

impl ModeController {
    /// Registry modes require the startup-built registry; live mode
    /// must not carry one.
    pub fn new(
        mode: ExecutionMode,
        runbook_path: &Path,
        registry: Option<Arc<ExecutableRegistry>>,
    ) -> CoreResult<Self> {
        match (mode, &registry) {
            (ExecutionMode::LiveReload, Some(_)) => {
                return Err(CoreError::Configuration(
                    "live-reload mode does not use a registry".to_string(),
                ));
            }
            (ExecutionMode::RegistryValidated | ExecutionMode::WatchNoReload, None) => {
                return Err(CoreError::Configuration(format!(
                    "{} mode requires a registry",
                    mode.as_str()
                )));
            }
            _ => {}
        }
        Ok(ModeController {
            mode,
            runbook_path: runbook_path.to_path_buf(),
            registry,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn registry(&self) -> Option<&Arc<ExecutableRegistry>> {
        self.registry.as_ref()
    }

    /// Resolves a target to the script that will run. Rejection happens
    /// here, before any process is spawned.
    pub fn resolve(&self, target: &ExecTarget) -> CoreResult<Executable> {
        match (self.mode, target) {
            (
                ExecutionMode::RegistryValidated | ExecutionMode::WatchNoReload,
                ExecTarget::Executable(id),
            ) => {
                let registry = self.registry.as_ref().ok_or_else(|| {
                    CoreError::Configuration("registry missing".to_string())
                })?;
                registry
                    .lookup(id)
                    .cloned()
                    .ok_or_else(|| CoreError::NotFound(id.to_string()))
            }
            (
                ExecutionMode::RegistryValidated | ExecutionMode::WatchNoReload,
                ExecTarget::Component(_),
            ) => Err(CoreError::Authorization(format!(
                "component ids are not accepted in {} mode",
                self.mode.as_str()
            ))),
            (ExecutionMode::LiveReload, ExecTarget::Component(component_id)) => {
                self.resolve_live(component_id)
            }
            (ExecutionMode::LiveReload, ExecTarget::Executable(_)) => {
                Err(CoreError::Authorization(
                    "registry executable ids are not accepted in live mode".to_string(),
                ))
            }
        }
    }

    /// Re-reads the runbook from disk and resolves one component. Every
    /// request sees the document as it currently is.
    fn resolve_live(&self, component_id: &str) -> CoreResult<Executable> {
        let extracted = markup::extract_from_file(&self.runbook_path)?;
        let base_dir = self
            .runbook_path
            .parent()
            .unwrap_or_else(|| Path::new("."));

        let decl = extracted
            .decls
            .iter()
            .find(|d| d.component_id == component_id)
            .ok_or_else(|| CoreError::NotFound(component_id.to_string()))?;

        Executable::from_decl(decl, base_dir).map_err(CoreError::Configuration)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
