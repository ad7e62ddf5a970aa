//! Shared primitive types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a declared executable block.
///
/// Checks support a distinct "warn" outcome (exit code 1); Commands
/// treat every non-zero exit as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Check,
    Command,
}

impl ComponentKind {
    /// The markup tag name for this kind (`Check` / `Command`).
    pub fn tag(self) -> &'static str {
        match self {
            ComponentKind::Check => "Check",
            ComponentKind::Command => "Command",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentKind::Check => "check",
            ComponentKind::Command => "command",
        })
    }
}

/// Lowercase hex encoding, used for hashes and session tokens.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        // write! to a String cannot fail.
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(ComponentKind::Check.to_string(), "check");
        assert_eq!(ComponentKind::Command.to_string(), "command");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ComponentKind::Check).expect("serialize"),
            "\"check\""
        );
    }

    #[test]
    fn hex_encoding() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
    }
}
