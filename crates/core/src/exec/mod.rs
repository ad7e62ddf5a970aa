//! Script execution: interpreter detection, the environment-capture
//! launcher, process supervision, and everything an execution leaves
//! behind (captured env, block outputs, generated files).

pub mod capture;
pub mod event;
pub mod files;
pub mod interpreter;
pub mod outcome;
pub mod outputs;
pub mod run;
pub mod wrapper;

pub use event::{ExecutionEvent, ExecutionState};
pub use files::CapturedFile;
pub use outcome::Outcome;
pub use run::{execute, ExecutionConfig, ExecutionSummary};
