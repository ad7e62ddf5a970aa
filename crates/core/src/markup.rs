//! Runbook markup extraction.
//!
//! A runbook is a markdown-flavored document carrying `<Check .../>` and
//! `<Command .../>` components. This module finds those components,
//! reads their props, and produces [`BlockDecl`]s for the registry to
//! resolve. Components inside fenced code blocks are documentation
//! examples and are skipped.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::CoreResult;
use crate::types::{to_hex, ComponentKind};

/// Where a declared block's script text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSource {
    /// Script given inline via the `command` prop (entity-unescaped).
    Inline(String),
    /// Script in a file referenced by the `path` prop, relative to the
    /// runbook's directory.
    File(String),
}

/// A declared executable block, as written in the runbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecl {
    /// Author-supplied `id` prop, or a deterministic hash-derived id
    /// when the author omitted one.
    pub component_id: String,
    pub kind: ComponentKind,
    pub source: BlockSource,
    /// Optional `interpreter` prop overriding shebang detection.
    pub interpreter_hint: Option<String>,
}

/// Result of scanning a runbook document.
#[derive(Debug, Default)]
pub struct ExtractedBlocks {
    pub decls: Vec<BlockDecl>,
    pub warnings: Vec<String>,
}

/// Reads and scans a runbook file.
pub fn extract_from_file(path: &Path) -> CoreResult<ExtractedBlocks> {
    let content = std::fs::read_to_string(path)?;
    Ok(extract_blocks(&content))
}

/// Scans document content for `Check` and `Command` components.
///
/// Duplicate component ids produce a warning and the later block is
/// ignored. Blocks with neither a `command` nor a `path` prop carry
/// nothing to execute and are silently skipped.
pub fn extract_blocks(content: &str) -> ExtractedBlocks {
    let code_block_ranges = fenced_code_block_ranges(content);
    let mut out = ExtractedBlocks::default();
    let mut seen: HashSet<String> = HashSet::new();

    for kind in [ComponentKind::Check, ComponentKind::Command] {
        let re = component_regex(kind.tag());
        for caps in re.captures_iter(content) {
            let Some(full) = caps.get(0) else { continue };
            if inside_range(full.start(), &code_block_ranges) {
                continue;
            }
            let props = &caps[1];

            let component_id = match extract_prop(props, "id") {
                Some(id) => id,
                None => derived_component_id(kind.tag(), props),
            };
            if !seen.insert(component_id.clone()) {
                out.warnings.push(format!(
                    "Duplicate <{}> component with id '{}' detected. The second \
                     instance will be ignored; give each component a unique id.",
                    kind.tag(),
                    component_id
                ));
                tracing::warn!(
                    component_type = kind.tag(),
                    component_id = %component_id,
                    "duplicate component detected"
                );
                continue;
            }

            let source = if let Some(command) = extract_prop(props, "command") {
                BlockSource::Inline(unescape_entities(&command))
            } else if let Some(path) = extract_prop(props, "path") {
                BlockSource::File(path)
            } else {
                continue;
            };

            out.decls.push(BlockDecl {
                component_id,
                kind,
                source,
                interpreter_hint: extract_prop(props, "interpreter"),
            });
        }
    }

    out
}

/// Matches both self-closing and container components:
/// `<Tag .../>` or `<Tag ...>...</Tag>`. The props pattern admits `>`
/// inside quoted attribute values ("...", '...', {`...`}, {"..."},
/// {'...'}).
fn component_regex(tag: &str) -> Regex {
    let props = r#"(?:"[^"]*"|'[^']*'|\{`[^`]*`\}|\{"[^"]*"\}|\{'[^']*'\}|[^>])*?"#;
    let pattern = format!(r"<{tag}\s+({props})(?:/>|>(?s:.*?)</{tag}>)");
    Regex::new(&pattern).expect("component pattern is valid")
}

/// Extracts a prop value from a component's raw props string.
/// Handles `name="v"`, `name='v'`, ``name={`v`}``, `name={"v"}`,
/// `name={'v'}`.
pub(crate) fn extract_prop(props: &str, name: &str) -> Option<String> {
    let name = regex::escape(name);
    let patterns = [
        format!(r#"{name}="([^"]*)""#),
        format!(r"{name}='([^']*)'"),
        format!(r"{name}=\{{`([^`]*)`\}}"),
        format!(r#"{name}=\{{"([^"]*)"\}}"#),
        format!(r"{name}=\{{'([^']*)'\}}"),
    ];
    for pattern in &patterns {
        let re = Regex::new(pattern).expect("prop pattern is valid");
        if let Some(caps) = re.captures(props) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Deterministic id for a component without an explicit `id` prop.
fn derived_component_id(tag: &str, props: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update(props.as_bytes());
    let digest = hasher.finalize();
    format!("{}_{}", tag, &to_hex(&digest)[..8])
}

/// Byte ranges of fenced code blocks. Fence markers (lines starting
/// with ``` or ~~~) alternate open/close through the document.
fn fenced_code_block_ranges(content: &str) -> Vec<(usize, usize)> {
    let fence = Regex::new(r"(?m)^[ \t]*(```|~~~)").expect("fence pattern is valid");
    let marks: Vec<usize> = fence.find_iter(content).map(|m| m.start()).collect();

    let mut ranges = Vec::new();
    for pair in marks.chunks_exact(2) {
        let open = pair[0];
        let close = pair[1];
        // Extend through the end of the closing fence line.
        let end = content[close..]
            .find('\n')
            .map(|nl| close + nl + 1)
            .unwrap_or(content.len());
        ranges.push((open, end));
    }
    ranges
}

fn inside_range(position: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(start, end)| position >= start && position < end)
}

/// Unescapes the HTML entities markup processors commonly emit into
/// prop values.
fn unescape_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
