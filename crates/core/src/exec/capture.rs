//! Environment dump parsing.
//!
//! Reads the side-channel files the launcher wrote at script exit. The
//! environment dump is `env -0` output, NUL-delimited, so values with
//! embedded newlines (keys, JSON, certificates) survive. A
//! newline-delimited dump is accepted as a fallback, stitching
//! multiline values back together by detecting which lines start a new
//! `NAME=value` record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::session::EnvMap;

/// Parses the captured environment and working directory.
///
/// A missing or empty environment dump is a capture failure: the script
/// exited before the launcher's handler ran, or the dump was lost. The
/// caller recovers by leaving the session untouched. The working
/// directory is best-effort and may be absent even on success.
pub fn parse_env_capture(
    env_path: &Path,
    pwd_path: &Path,
) -> CoreResult<(EnvMap, Option<PathBuf>)> {
    let data = match std::fs::read_to_string(env_path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(CoreError::Capture(
                "environment dump file was not written".to_string(),
            ));
        }
        Err(err) => {
            return Err(CoreError::Capture(format!(
                "failed to read environment dump: {err}"
            )));
        }
    };

    let env = if data.contains('\0') {
        parse_nul_delimited(&data)
    } else {
        parse_newline_delimited(&data)
    };

    if env.is_empty() {
        return Err(CoreError::Capture("environment dump was empty".to_string()));
    }

    let pwd = match std::fs::read_to_string(pwd_path) {
        Ok(content) => {
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
        }
        Err(_) => None,
    };

    Ok((env, pwd))
}

/// `env -0` output: each record is a complete `NAME=value` pair.
fn parse_nul_delimited(data: &str) -> EnvMap {
    let mut env = EnvMap::new();
    for entry in data.split('\0') {
        if entry.is_empty() {
            continue;
        }
        if let Some(eq) = entry.find('=') {
            env.insert(entry[..eq].to_string(), entry[eq + 1..].to_string());
        }
    }
    env
}

/// Plain `env` output. A line starts a new record only when the text
/// before its first `=` is a valid variable name; other lines continue
/// the previous value.
fn parse_newline_delimited(data: &str) -> EnvMap {
    let mut env = EnvMap::new();
    let mut current_key: Option<String> = None;
    let mut value_lines: Vec<&str> = Vec::new();

    for line in data.split('\n') {
        let starts_record = line
            .find('=')
            .is_some_and(|eq| eq > 0 && is_valid_env_name(&line[..eq]));
        if starts_record {
            if let Some(key) = current_key.take() {
                env.insert(key, value_lines.join("\n"));
            }
            let eq = line.find('=').unwrap_or(0);
            current_key = Some(line[..eq].to_string());
            value_lines = vec![&line[eq + 1..]];
        } else if current_key.is_some() && !line.is_empty() {
            value_lines.push(line);
        }
    }
    if let Some(key) = current_key {
        env.insert(key, value_lines.join("\n"));
    }
    env
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
