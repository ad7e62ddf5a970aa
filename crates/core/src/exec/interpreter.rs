//! Interpreter detection.

/// The program a script runs under, with any arguments the shebang
/// carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

/// Picks the interpreter for a script.
///
/// An explicit hint (the block's `interpreter` prop) wins. Otherwise
/// the shebang line decides, handling both `#!/usr/bin/env python3`
/// and direct-path forms (reduced to the binary name). No shebang means
/// the default POSIX shell.
pub fn detect(script: &str, hint: Option<&str>) -> Interpreter {
    if let Some(hint) = hint {
        if !hint.is_empty() {
            return Interpreter {
                program: hint.to_string(),
                args: Vec::new(),
            };
        }
    }

    if let Some(first_line) = script.lines().next() {
        if let Some(shebang) = first_line.strip_prefix("#!") {
            let mut parts = shebang.trim().split_whitespace();
            if let Some(first) = parts.next() {
                if first.ends_with("/env") {
                    // #!/usr/bin/env python3 [args...]
                    if let Some(program) = parts.next() {
                        return Interpreter {
                            program: program.to_string(),
                            args: parts.map(str::to_string).collect(),
                        };
                    }
                } else {
                    // #!/bin/bash [args...]
                    let program = first.rsplit('/').next().unwrap_or(first);
                    return Interpreter {
                        program: program.to_string(),
                        args: parts.map(str::to_string).collect(),
                    };
                }
            }
        }
    }

    Interpreter {
        program: "bash".to_string(),
        args: Vec::new(),
    }
}

/// Whether scripts under this interpreter participate in session
/// propagation (environment capture via the launcher wrapper). Only
/// POSIX shells do; everything else runs as written and its mutations
/// die with the process.
pub fn is_propagating_shell(program: &str) -> bool {
    matches!(
        program,
        "bash" | "sh" | "/bin/bash" | "/bin/sh" | "/usr/bin/bash" | "/usr/bin/sh"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
