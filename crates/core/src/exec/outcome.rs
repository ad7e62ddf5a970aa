//! Exit-code classification.

use serde::{Deserialize, Serialize};

use crate::types::ComponentKind;

/// The classified result of a finished script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    /// Checks only: the condition holds but deserves attention.
    Warn,
    Fail,
}

/// Maps an exit code to an outcome.
///
/// Checks reserve exit 1 for the warn state; anything 2 and above is a
/// failure. Commands have no warn state, every non-zero exit fails.
pub fn classify(kind: ComponentKind, exit_code: i32) -> Outcome {
    match (kind, exit_code) {
        (_, 0) => Outcome::Success,
        (ComponentKind::Check, 1) => Outcome::Warn,
        _ => Outcome::Fail,
    }
}

/// Whether an execution's side products (generated files, block
/// outputs, captured environment) are kept. Failures discard all of
/// them.
pub fn retains_artifacts(outcome: Outcome) -> bool {
    matches!(outcome, Outcome::Success | Outcome::Warn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_exit_codes() {
        assert_eq!(classify(ComponentKind::Check, 0), Outcome::Success);
        assert_eq!(classify(ComponentKind::Check, 1), Outcome::Warn);
        assert_eq!(classify(ComponentKind::Check, 2), Outcome::Fail);
        assert_eq!(classify(ComponentKind::Check, 127), Outcome::Fail);
    }

    #[test]
    fn command_exit_codes() {
        assert_eq!(classify(ComponentKind::Command, 0), Outcome::Success);
        assert_eq!(classify(ComponentKind::Command, 1), Outcome::Fail);
        assert_eq!(classify(ComponentKind::Command, 2), Outcome::Fail);
    }

    #[test]
    fn negative_exit_code_fails() {
        // Timeouts and signal deaths are reported as -1.
        assert_eq!(classify(ComponentKind::Check, -1), Outcome::Fail);
        assert_eq!(classify(ComponentKind::Command, -1), Outcome::Fail);
    }

    #[test]
    fn artifacts_gated_on_success_or_warn() {
        assert!(retains_artifacts(Outcome::Success));
        assert!(retains_artifacts(Outcome::Warn));
        assert!(!retains_artifacts(Outcome::Fail));
    }
}
