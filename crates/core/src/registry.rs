//! Executable registry.
//!
//! The server never executes arbitrary commands. At startup the runbook
//! is scanned and every declared block is registered here; the API only
//! accepts requests naming a registered executable. The registry is
//! immutable after construction, so lookups need no locking and display
//! refreshes can never widen what is runnable.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::markup::{BlockDecl, BlockSource, ExtractedBlocks};
use crate::template;
use crate::types::{to_hex, ComponentKind};

/// Opaque registry-issued executable id.
///
/// Distinct from the author-supplied component id: derived from a hash
/// of the component id and the resolved script content, so an id names
/// one exact script text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableId(String);

impl ExecutableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExecutableId {
    fn from(s: String) -> Self {
        ExecutableId(s)
    }
}

impl fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the script text was inline in the runbook or read from a
/// referenced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Inline,
    File,
}

/// A registered script. Holds the full script content; never serialize
/// this type to the API, use [`ExecutableMeta`] instead.
#[derive(Debug, Clone)]
pub struct Executable {
    pub id: ExecutableId,
    pub component_id: String,
    pub kind: ComponentKind,
    pub source_kind: SourceKind,
    pub script_content: String,
    /// Full sha256 of the content, for drift detection against files
    /// edited after startup.
    pub content_hash: String,
    /// Original `path` prop for file-based scripts.
    pub script_path: Option<String>,
    pub template_var_names: Vec<String>,
    pub interpreter_hint: Option<String>,
}

impl Executable {
    /// Resolves a declared block into an executable. File reads are
    /// relative to the runbook's directory; a failed read is a
    /// configuration problem for the caller to degrade or surface.
    pub fn from_decl(decl: &BlockDecl, base_dir: &Path) -> Result<Self, String> {
        let (source_kind, script_content, script_path) = match &decl.source {
            BlockSource::Inline(text) => (SourceKind::Inline, text.clone(), None),
            BlockSource::File(rel) => {
                let full = base_dir.join(rel);
                let content = std::fs::read_to_string(&full).map_err(|err| {
                    format!(
                        "<{} id=\"{}\">: failed to read script file {}: {}",
                        decl.kind.tag(),
                        decl.component_id,
                        rel,
                        err
                    )
                })?;
                (SourceKind::File, content, Some(rel.clone()))
            }
        };

        Ok(Executable {
            id: executable_id(&decl.component_id, &script_content),
            component_id: decl.component_id.clone(),
            kind: decl.kind,
            source_kind,
            content_hash: content_hash(&script_content),
            template_var_names: template::extract_vars(&script_content),
            interpreter_hint: decl.interpreter_hint.clone(),
            script_content,
            script_path,
        })
    }

    /// The metadata view safe to expose to the UI.
    pub fn meta(&self) -> ExecutableMeta {
        ExecutableMeta {
            id: self.id.clone(),
            component_id: self.component_id.clone(),
            kind: self.kind,
            source_kind: self.source_kind,
            content_hash: self.content_hash.clone(),
            script_path: self.script_path.clone(),
            template_var_names: self.template_var_names.clone(),
        }
    }
}

/// What the UI sees about an executable. Script content is deliberately
/// absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableMeta {
    pub id: ExecutableId,
    pub component_id: String,
    #[serde(rename = "component_type")]
    pub kind: ComponentKind,
    #[serde(rename = "type")]
    pub source_kind: SourceKind,
    #[serde(rename = "script_content_hash")]
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub template_var_names: Vec<String>,
}

/// The startup-built whitelist of everything the runbook declares.
#[derive(Debug)]
pub struct ExecutableRegistry {
    executables: indexmap::IndexMap<ExecutableId, Executable>,
    warnings: Vec<String>,
}

impl ExecutableRegistry {
    /// Builds the registry from extracted blocks. Resolution failures
    /// (missing or unreadable script files) degrade to warnings with
    /// the entry omitted; they never fail startup.
    pub fn build(extracted: ExtractedBlocks, base_dir: &Path) -> Self {
        let mut executables = indexmap::IndexMap::new();
        let mut warnings = extracted.warnings;

        for decl in &extracted.decls {
            match Executable::from_decl(decl, base_dir) {
                Ok(exec) => {
                    executables.insert(exec.id.clone(), exec);
                }
                Err(warning) => {
                    tracing::warn!(
                        component_id = %decl.component_id,
                        %warning,
                        "skipping unresolvable block"
                    );
                    warnings.push(warning);
                }
            }
        }

        ExecutableRegistry {
            executables,
            warnings,
        }
    }

    /// Side-effect-free lookup.
    pub fn lookup(&self, id: &ExecutableId) -> Option<&Executable> {
        self.executables.get(id)
    }

    /// Metadata for every registered executable, in document order.
    pub fn list(&self) -> Vec<ExecutableMeta> {
        self.executables.values().map(Executable::meta).collect()
    }

    /// Warnings collected while building (duplicates, unreadable files).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.executables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }
}

/// First 16 hex chars of sha256(component_id + content).
fn executable_id(component_id: &str, content: &str) -> ExecutableId {
    let mut hasher = Sha256::new();
    hasher.update(component_id.as_bytes());
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    ExecutableId(to_hex(&digest)[..16].to_string())
}

/// Full sha256 hex of the script content.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    to_hex(&hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
