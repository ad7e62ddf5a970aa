//! Block output parsing.
//!
//! Scripts declare structured outputs by appending `key=value` lines to
//! the file named by `RUNBOOK_OUTPUT`. Keys must be valid identifiers
//! (`^[A-Za-z_][A-Za-z0-9_]*$`); invalid lines are logged and skipped,
//! never fatal.

use std::io;
use std::path::Path;

use indexmap::IndexMap;

/// Parses the outputs file. A missing file means the script declared no
/// outputs.
pub fn parse_block_outputs(path: &Path) -> io::Result<IndexMap<String, String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(err) => return Err(err),
    };

    let mut outputs = IndexMap::new();
    for (line_num, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some(eq) = line.find('=') else {
            tracing::warn!(line = line_num + 1, content = line, "output line has no '='");
            continue;
        };
        let key = line[..eq].trim();
        // Value keeps its whitespace.
        let value = &line[eq + 1..];
        if !is_valid_output_key(key) {
            tracing::warn!(line = line_num + 1, key, "invalid output key");
            continue;
        }
        outputs.insert(key.to_string(), value.to_string());
    }
    Ok(outputs)
}

pub(crate) fn is_valid_output_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
