//! Environment-capture launcher.
//!
//! Shell scripts run wrapped in a statically-known bash launcher that
//! dumps the final environment and working directory to side-channel
//! files when the script exits, whatever the exit path. Because bash
//! allows one handler per signal, a user `trap ... EXIT` would replace
//! ours; the launcher shadows the `trap` builtin to save the user's
//! EXIT handler instead, and a combined handler runs it first, then
//! captures, then exits with the script's original code.

use std::path::Path;

const LAUNCHER_TEMPLATE: &str = r#"#!/bin/bash
# Environment capture launcher. Runs the user script in this shell so
# exports and cd persist into the capture below.

__RUNBOOK_ENV_CAPTURE_PATH="@ENV_CAPTURE_PATH@"
__RUNBOOK_PWD_CAPTURE_PATH="@PWD_CAPTURE_PATH@"

# env -0 is NUL-delimited; values may contain embedded newlines.
__runbook_capture_env() {
    env -0 > "$__RUNBOOK_ENV_CAPTURE_PATH" 2>/dev/null
    pwd > "$__RUNBOOK_PWD_CAPTURE_PATH" 2>/dev/null
}

# Shadow the trap builtin. User EXIT handlers are saved here rather
# than installed, so our own EXIT trap survives; all other traps pass
# through to the builtin.
__RUNBOOK_USER_EXIT_HANDLER=""

trap() {
    # Query flags pass straight through.
    if [[ "$1" == "-p" || "$1" == "-l" ]]; then
        builtin trap "$@"
        return $?
    fi

    local has_exit=false
    local i
    for i in "$@"; do
        if [[ "$i" == "EXIT" || "$i" == "0" ]]; then
            has_exit=true
            break
        fi
    done

    if $has_exit && [[ $# -ge 2 ]]; then
        local handler="$1"
        if [[ "$handler" == "-" || -z "$handler" ]]; then
            # trap - EXIT / trap '' EXIT: clear the saved handler.
            __RUNBOOK_USER_EXIT_HANDLER=""
        else
            __RUNBOOK_USER_EXIT_HANDLER="$handler"
        fi
        return 0
    fi

    builtin trap "$@"
}

__runbook_combined_exit() {
    local exit_code=$?

    # User cleanup runs first, then capture, then the original code.
    if [[ -n "$__RUNBOOK_USER_EXIT_HANDLER" ]]; then
        eval "$__RUNBOOK_USER_EXIT_HANDLER" || true
    fi

    __runbook_capture_env

    exit $exit_code
}

# builtin bypasses the shadow above.
builtin trap __runbook_combined_exit EXIT

@USER_SCRIPT@
"#;

/// Wraps a shell script in the capture launcher.
pub fn wrap_for_env_capture(script: &str, env_capture: &Path, pwd_capture: &Path) -> String {
    // Side-channel paths are substituted before the user script so
    // script text can never collide with the placeholders.
    LAUNCHER_TEMPLATE
        .replace("@ENV_CAPTURE_PATH@", &env_capture.display().to_string())
        .replace("@PWD_CAPTURE_PATH@", &pwd_capture.display().to_string())
        .replace("@USER_SCRIPT@", script)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
