//! Script execution.
//!
//! One call to [`execute`] runs one declared block to completion:
//! snapshot the session, render templates, write the temp script, spawn
//! the child in its own process group, stream output lines into the
//! event channel, then on exit classify the outcome and fold captured
//! state back into the session. Temp files are [`tempfile`] guards, so
//! cleanup happens on drop in every path including cancellation.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::registry::Executable;
use crate::session::{self, EnvMap, SessionManager};
use crate::template;

use super::capture;
use super::event::{ExecutionEvent, ExecutionState};
use super::files;
use super::interpreter;
use super::outcome::{self, Outcome};
use super::outputs;
use super::wrapper;

/// Server-level settings an execution needs.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Where promoted generated files land.
    pub output_dir: PathBuf,
    /// Optional shared workspace, exposed as `RUNBOOK_WORKSPACE` when
    /// it exists on disk.
    pub workspace_dir: Option<PathBuf>,
    /// Wall-clock limit; the process group is killed when it elapses.
    pub timeout: Duration,
}

/// What an execution came to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub outcome: Outcome,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub cancelled: bool,
    /// Whether the session was updated from the script's captured
    /// environment.
    pub env_captured: bool,
}

enum Waited {
    Exited(std::process::ExitStatus),
    Cancelled,
    TimedOut,
}

/// Runs one executable to completion, emitting events as it goes. The
/// final event is always a `result`.
///
/// Script failures are not `Err`s; they come back as classified
/// summaries. `Err` means the engine itself could not run the script
/// (spawn failure, I/O trouble while preparing temp files).
pub async fn execute(
    executable: &Executable,
    template_values: &HashMap<String, String>,
    env_overrides: &EnvMap,
    session: &SessionManager,
    config: &ExecutionConfig,
    events: mpsc::Sender<ExecutionEvent>,
    cancel: CancellationToken,
) -> CoreResult<ExecutionSummary> {
    let snapshot = session.snapshot()?;
    let script = template::render(&executable.script_content, template_values);
    let interp = interpreter::detect(&script, executable.interpreter_hint.as_deref());
    let propagating = interpreter::is_propagating_shell(&interp.program);

    // Side-channel files only exist for propagating (shell) scripts.
    let side_channels = if propagating {
        let env = tempfile::Builder::new()
            .prefix("runbook-env-")
            .tempfile()?
            .into_temp_path();
        let pwd = tempfile::Builder::new()
            .prefix("runbook-pwd-")
            .tempfile()?
            .into_temp_path();
        Some((env, pwd))
    } else {
        None
    };

    let scratch_dir = tempfile::Builder::new()
        .prefix("runbook-files-")
        .tempdir()?;
    let outputs_path = tempfile::Builder::new()
        .prefix("runbook-output-")
        .tempfile()?
        .into_temp_path();

    let script_text = match &side_channels {
        Some((env, pwd)) => wrapper::wrap_for_env_capture(&script, env, pwd),
        None => script.clone(),
    };
    let script_path = write_temp_script(&script_text)?;

    // The launcher wrapper is bash, whatever shell the shebang named.
    let program = if propagating {
        "bash".to_string()
    } else {
        interp.program.clone()
    };
    let mut cmd = Command::new(&program);
    if !propagating {
        cmd.args(&interp.args);
    }
    cmd.arg(&*script_path);

    cmd.env_clear();
    cmd.envs(snapshot.env.iter());
    if !snapshot.env.contains_key("PATH") {
        // A session stripped of PATH would make every script fail on
        // the first binary; fall back to the server's own.
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
    }
    cmd.envs(env_overrides.iter());
    cmd.env("GENERATED_FILES", scratch_dir.path());
    cmd.env("RUNBOOK_FILES", scratch_dir.path());
    cmd.env("RUNBOOK_OUTPUT", &*outputs_path);
    if let Some(workspace) = &config.workspace_dir {
        if workspace.exists() {
            cmd.env("RUNBOOK_WORKSPACE", workspace);
        }
    }

    cmd.current_dir(&snapshot.working_dir);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            let core_err = if err.kind() == std::io::ErrorKind::NotFound {
                CoreError::Interpreter {
                    interpreter: program.clone(),
                    source: err,
                }
            } else {
                CoreError::Process(err)
            };
            emit(
                &events,
                ExecutionEvent::Warning {
                    message: core_err.to_string(),
                },
            )
            .await;
            emit(
                &events,
                ExecutionEvent::Result {
                    outcome: Outcome::Fail,
                    exit_code: None,
                    duration_ms: elapsed_ms(start),
                    cancelled: false,
                },
            )
            .await;
            return Err(core_err);
        }
    };

    tracing::info!(
        executable_id = %executable.id,
        component_id = %executable.component_id,
        %program,
        propagating,
        "execution started"
    );
    emit(
        &events,
        ExecutionEvent::Status {
            state: ExecutionState::Running,
        },
    )
    .await;

    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let tx = events.clone();
        readers.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(ExecutionEvent::Stdout { line }).await.is_err() {
                    break;
                }
            }
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = events.clone();
        readers.push(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(ExecutionEvent::Stderr { line }).await.is_err() {
                    break;
                }
            }
        }));
    }

    let waited = tokio::select! {
        status = child.wait() => Waited::Exited(status.map_err(CoreError::Process)?),
        _ = cancel.cancelled() => Waited::Cancelled,
        _ = tokio::time::sleep(config.timeout) => Waited::TimedOut,
    };

    if !matches!(waited, Waited::Exited(_)) {
        kill_process_group(&mut child);
        let _ = child.wait().await;
    }
    for reader in readers {
        let _ = reader.await;
    }

    let duration_ms = elapsed_ms(start);
    match waited {
        Waited::Cancelled => {
            tracing::info!(executable_id = %executable.id, "execution cancelled");
            emit(
                &events,
                ExecutionEvent::Status {
                    state: ExecutionState::Cancelled,
                },
            )
            .await;
            emit(
                &events,
                ExecutionEvent::Result {
                    outcome: Outcome::Fail,
                    exit_code: None,
                    duration_ms,
                    cancelled: true,
                },
            )
            .await;
            Ok(ExecutionSummary {
                outcome: Outcome::Fail,
                exit_code: None,
                duration_ms,
                cancelled: true,
                env_captured: false,
            })
        }
        Waited::TimedOut => {
            tracing::warn!(
                executable_id = %executable.id,
                timeout_secs = config.timeout.as_secs(),
                "execution timed out"
            );
            emit(
                &events,
                ExecutionEvent::Warning {
                    message: format!(
                        "execution timed out after {}s",
                        config.timeout.as_secs()
                    ),
                },
            )
            .await;
            emit(
                &events,
                ExecutionEvent::Status {
                    state: ExecutionState::TimedOut,
                },
            )
            .await;
            emit(
                &events,
                ExecutionEvent::Result {
                    outcome: Outcome::Fail,
                    exit_code: Some(-1),
                    duration_ms,
                    cancelled: false,
                },
            )
            .await;
            Ok(ExecutionSummary {
                outcome: Outcome::Fail,
                exit_code: Some(-1),
                duration_ms,
                cancelled: false,
                env_captured: false,
            })
        }
        Waited::Exited(status) => {
            // Signal death has no code; classify like a timeout kill.
            let exit_code = status.code().unwrap_or(-1);
            let outcome = outcome::classify(executable.kind, exit_code);
            let mut env_captured = false;

            if outcome::retains_artifacts(outcome) {
                match outputs::parse_block_outputs(&outputs_path) {
                    Ok(outs) if !outs.is_empty() => {
                        emit(&events, ExecutionEvent::Outputs { outputs: outs }).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        emit(
                            &events,
                            ExecutionEvent::Warning {
                                message: format!("failed to read block outputs: {err}"),
                            },
                        )
                        .await;
                    }
                }

                match files::promote_generated_files(scratch_dir.path(), &config.output_dir) {
                    Ok(promoted) if !promoted.is_empty() => {
                        emit(&events, ExecutionEvent::FilesCaptured { files: promoted }).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        emit(
                            &events,
                            ExecutionEvent::Warning {
                                message: format!("failed to capture generated files: {err}"),
                            },
                        )
                        .await;
                    }
                }

                if let Some((env_path, pwd_path)) = &side_channels {
                    match capture::parse_env_capture(env_path, pwd_path) {
                        Ok((env, pwd)) => {
                            let filtered = session::filter_captured_env(env);
                            let new_dir =
                                pwd.unwrap_or_else(|| snapshot.working_dir.clone());
                            match session.replace(filtered, new_dir) {
                                Ok(()) => env_captured = true,
                                Err(err) => {
                                    emit(
                                        &events,
                                        ExecutionEvent::Warning {
                                            message: format!(
                                                "session update failed: {err}"
                                            ),
                                        },
                                    )
                                    .await;
                                }
                            }
                        }
                        Err(err) => {
                            // Session stays as it was.
                            tracing::warn!(
                                executable_id = %executable.id,
                                error = %err,
                                "environment capture failed"
                            );
                            emit(
                                &events,
                                ExecutionEvent::Warning {
                                    message: err.to_string(),
                                },
                            )
                            .await;
                        }
                    }
                }
            }

            tracing::info!(
                executable_id = %executable.id,
                exit_code,
                ?outcome,
                duration_ms,
                env_captured,
                "execution finished"
            );
            emit(
                &events,
                ExecutionEvent::Result {
                    outcome,
                    exit_code: Some(exit_code),
                    duration_ms,
                    cancelled: false,
                },
            )
            .await;
            Ok(ExecutionSummary {
                outcome,
                exit_code: Some(exit_code),
                duration_ms,
                cancelled: false,
                env_captured,
            })
        }
    }
}

/// Writes the script to a temp file, owner-executable only.
fn write_temp_script(content: &str) -> CoreResult<tempfile::TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("runbook-script-")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    let path = file.into_temp_path();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(path)
}

/// Kills the child's whole process group so descendants die with it.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    } else {
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.start_kill();
}

async fn emit(events: &mpsc::Sender<ExecutionEvent>, event: ExecutionEvent) {
    // A dropped receiver just means nobody is listening anymore.
    let _ = events.send(event).await;
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
