//! Execution event model.
//!
//! Everything an execution tells the outside world flows through
//! [`ExecutionEvent`]s, serialized as tagged JSON for the SSE stream.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::files::CapturedFile;
use super::outcome::Outcome;

/// Coarse execution state, reported via `status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Cancelled,
    TimedOut,
}

/// One event in an execution's stream. Every subscriber, including late
/// joiners fed from the replay log, sees the identical sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Stdout { line: String },
    Stderr { line: String },
    Status { state: ExecutionState },
    /// Non-fatal problem (capture failure, timeout notice, ...).
    Warning { message: String },
    /// Parsed `RUNBOOK_OUTPUT` key=value pairs.
    Outputs { outputs: IndexMap<String, String> },
    /// Files promoted from the scratch directory to the output dir.
    FilesCaptured { files: Vec<CapturedFile> },
    /// Terminal event; exactly one per execution, always last.
    Result {
        outcome: Outcome,
        /// `None` when no exit code exists (cancelled, spawn failure).
        exit_code: Option<i32>,
        duration_ms: u64,
        cancelled: bool,
    },
}

impl ExecutionEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionEvent::Result { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ExecutionEvent::Stdout {
            line: "hello".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "stdout");
        assert_eq!(json["line"], "hello");
    }

    #[test]
    fn result_event_round_trips() {
        let event = ExecutionEvent::Result {
            outcome: Outcome::Warn,
            exit_code: Some(1),
            duration_ms: 42,
            cancelled: false,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: ExecutionEvent = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_terminal());
        match back {
            ExecutionEvent::Result {
                outcome, exit_code, ..
            } => {
                assert_eq!(outcome, Outcome::Warn);
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn only_result_is_terminal() {
        assert!(!ExecutionEvent::Stderr {
            line: String::new()
        }
        .is_terminal());
        assert!(!ExecutionEvent::Status {
            state: ExecutionState::Running
        }
        .is_terminal());
    }
}
