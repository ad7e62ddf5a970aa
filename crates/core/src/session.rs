//! Persistent shell-like session.
//!
//! One session per server process, shared by every browser tab. Scripts
//! mutate the session's environment and working directory like
//! successive commands in one terminal: each execution snapshots the
//! state at start and replaces it wholesale at completion. There is
//! deliberately no cross-execution locking; overlapping executions are
//! last-writer-wins, exactly like two terminals sharing a dotfile.
//!
//! Environment values are never exposed through the API; only
//! [`SessionMetadata`] leaves this module in serialized form.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::RngCore;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::types::to_hex;

/// Ordered environment map. Order is preserved so env listings stay
/// stable across executions.
pub type EnvMap = IndexMap<String, String>;

/// Concurrent browser tabs each hold a token; beyond this many the
/// oldest token is pruned.
pub const MAX_TOKENS_PER_SESSION: usize = 20;

/// Shell internals and per-process variables that must not leak from a
/// finished script back into the session.
const EXCLUDED_ENV_VARS: &[&str] = &[
    "_",
    "SHLVL",
    "OLDPWD",
    "FUNCNAME",
    "LINENO",
    "RANDOM",
    "SECONDS",
    "EPOCHSECONDS",
    "EPOCHREALTIME",
    "BASHPID",
    "PPID",
    "PIPESTATUS",
    "HISTCMD",
    "SRANDOM",
];

/// Per-execution variables injected by the executor; scripts see them
/// but they must not persist into the session.
const INJECTED_ENV_VARS: &[&str] = &[
    "GENERATED_FILES",
    "RUNBOOK_FILES",
    "RUNBOOK_OUTPUT",
    "RUNBOOK_WORKSPACE",
];

#[derive(Debug)]
struct SessionState {
    /// Issued bearer tokens, oldest first.
    tokens: Vec<String>,
    env: EnvMap,
    initial_env: EnvMap,
    working_dir: PathBuf,
    initial_working_dir: PathBuf,
    execution_count: u64,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

/// A point-in-time copy of the session taken at execution start. The
/// executor works entirely from this copy.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub env: EnvMap,
    pub working_dir: PathBuf,
}

/// Public-safe session view. Environment values are intentionally
/// absent.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMetadata {
    pub working_dir: PathBuf,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub active_tabs: usize,
}

/// Thread-safe access to the single session. `None` until the first
/// client connects.
#[derive(Debug, Default)]
pub struct SessionManager {
    state: RwLock<Option<SessionState>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the session, seeded from the server's own environment
    /// and the given working directory (the runbook's directory).
    /// Replaces any existing session, invalidating all prior tokens.
    pub fn create(&self, initial_working_dir: &Path) -> CoreResult<String> {
        let working_dir = std::path::absolute(initial_working_dir)?;
        let env: EnvMap = std::env::vars().collect();
        let token = generate_token();
        let now = Utc::now();

        let state = SessionState {
            tokens: vec![token.clone()],
            initial_env: env.clone(),
            env,
            initial_working_dir: working_dir.clone(),
            working_dir,
            execution_count: 0,
            created_at: now,
            last_activity: now,
        };

        *self.state.write().expect("session lock poisoned") = Some(state);
        Ok(token)
    }

    /// Issues an additional token for a new tab joining the existing
    /// session. Returns `NoSession` if none exists.
    pub fn join(&self) -> CoreResult<String> {
        let mut guard = self.state.write().expect("session lock poisoned");
        let state = guard.as_mut().ok_or(CoreError::NoSession)?;

        if state.tokens.len() >= MAX_TOKENS_PER_SESSION {
            // Oldest first; creation order is insertion order.
            state.tokens.remove(0);
        }

        let token = generate_token();
        state.tokens.push(token.clone());
        state.last_activity = Utc::now();
        Ok(token)
    }

    pub fn validate_token(&self, token: &str) -> bool {
        let guard = self.state.read().expect("session lock poisoned");
        match guard.as_ref() {
            Some(state) => state.tokens.iter().any(|t| t == token),
            None => false,
        }
    }

    /// Removes one token (tab close). Returns whether it existed.
    pub fn revoke_token(&self, token: &str) -> bool {
        let mut guard = self.state.write().expect("session lock poisoned");
        let Some(state) = guard.as_mut() else {
            return false;
        };
        let before = state.tokens.len();
        state.tokens.retain(|t| t != token);
        state.tokens.len() < before
    }

    pub fn has_session(&self) -> bool {
        self.state
            .read()
            .expect("session lock poisoned")
            .is_some()
    }

    /// Copies the current env and working dir for an execution to work
    /// from.
    pub fn snapshot(&self) -> CoreResult<SessionSnapshot> {
        let guard = self.state.read().expect("session lock poisoned");
        let state = guard.as_ref().ok_or(CoreError::NoSession)?;
        Ok(SessionSnapshot {
            env: state.env.clone(),
            working_dir: state.working_dir.clone(),
        })
    }

    /// Replaces the session's entire environment and working directory
    /// with a finished execution's captured state. Whole-state
    /// replacement, never a merge: a variable the script unset stays
    /// unset.
    pub fn replace(&self, env: EnvMap, working_dir: PathBuf) -> CoreResult<()> {
        let mut guard = self.state.write().expect("session lock poisoned");
        let state = guard.as_mut().ok_or(CoreError::NoSession)?;
        state.env = env;
        state.working_dir = working_dir;
        state.execution_count += 1;
        state.last_activity = Utc::now();
        Ok(())
    }

    /// Restores the creation-time environment and working directory.
    pub fn reset(&self) -> CoreResult<()> {
        let mut guard = self.state.write().expect("session lock poisoned");
        let state = guard.as_mut().ok_or(CoreError::NoSession)?;
        state.env = state.initial_env.clone();
        state.working_dir = state.initial_working_dir.clone();
        state.last_activity = Utc::now();
        Ok(())
    }

    /// Drops the session and invalidates every token.
    pub fn delete(&self) {
        *self.state.write().expect("session lock poisoned") = None;
    }

    pub fn metadata(&self) -> Option<SessionMetadata> {
        let guard = self.state.read().expect("session lock poisoned");
        guard.as_ref().map(|state| SessionMetadata {
            working_dir: state.working_dir.clone(),
            execution_count: state.execution_count,
            created_at: state.created_at,
            last_activity: state.last_activity,
            active_tabs: state.tokens.len(),
        })
    }
}

/// 32 random bytes, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Drops shell-internal and injected variables from a captured
/// environment before it replaces the session state.
pub fn filter_captured_env(env: EnvMap) -> EnvMap {
    env.into_iter()
        .filter(|(k, _)| {
            !EXCLUDED_ENV_VARS.contains(&k.as_str())
                && !INJECTED_ENV_VARS.contains(&k.as_str())
                && !k.starts_with("BASH_")
                && !k.starts_with("__RUNBOOK_")
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
