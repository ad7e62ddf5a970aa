//! Runbook execution engine.
//!
//! A runbook is a document mixing prose with declared shell-executable
//! steps. This crate implements the server-side engine that makes those
//! steps safe to run from a browser-facing API: the startup-built
//! [`registry::ExecutableRegistry`] (the whitelist that is the only
//! defense against arbitrary remote code execution), the single
//! persistent [`session::SessionManager`] (environment + working
//! directory shared by every execution), and the [`exec`] module
//! (process spawning, interpreter detection, environment capture,
//! output streaming, cancellation).
//!
//! No HTTP lives here; the `runbook-api` crate owns the transport.

pub mod error;
pub mod exec;
pub mod markup;
pub mod mode;
pub mod registry;
pub mod session;
pub mod template;
pub mod types;

pub use error::{CoreError, CoreResult};
