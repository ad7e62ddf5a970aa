//! Runbook API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! the file watcher) so integration tests and the binary entrypoint can
//! both access them.

pub mod auth;
pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
pub mod watcher;

pub use router::build_router;
