//! Per-execution event streams.
//!
//! The executor writes [`runbook_core::exec::ExecutionEvent`]s into a
//! bounded channel; this crate pumps them into a replay log plus a
//! broadcast, so any number of tabs can watch one execution and late
//! subscribers see the identical sequence from the start.

mod streams;

pub use streams::{StreamRegistry, Subscription};
