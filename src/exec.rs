//! Step execution.
//!
//! `StepRunner` is the seam between orchestration and the operating system:
//! the orchestrator only sees `StepResult`s, so tests swap in a scripted
//! runner while `ProcessRunner` spawns real children.
//!
//! A process run goes through these checks, in order:
//! - the step's declared output directory is created if missing
//! - a GUI-enabled step without a display fails before spawning
//! - the child runs in the workdir with both pipes drained on reader threads
//! - the child is polled until it exits or the run is cancelled
use crate::context::RunContext;
use crate::error::{RunError, EXIT_INTERRUPTED, EXIT_SPAWN_FAILED, EXIT_UNAVAILABLE};
use crate::outdir::ensure_output_dir;
use crate::registry::{Step, StepId};
use crate::resolve::ResolvedCommand;
use crate::signal::CancelToken;
use serde::{Serialize, Serializer};
use std::ffi::OsString;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

const DISPLAY_ENV_VARS: &[&str] = &["DISPLAY", "WAYLAND_DISPLAY"];

/// Output fragments that mean the step could not reach a display server.
const DISPLAY_MARKERS: &[&str] = &[
    "no display name",
    "couldn't connect to display",
    "could not connect to display",
    "cannot open display",
    "cannot connect to x server",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    MissingDisplay,
    SpawnFailed,
    Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capture {
    pub stdout: String,
    pub stderr: String,
}

/// Record of one executed step. Never mutated after the runner returns it.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub name: &'static str,
    pub command: ResolvedCommand,
    pub exit_code: i32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip)]
    pub capture: Capture,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == StepOutcome::Succeeded
    }

    /// Error this result represents, if the step did not succeed.
    pub fn error(&self) -> Option<RunError> {
        let (step, name, exit_code) = (self.step_id, self.name, self.exit_code);
        match self.outcome {
            StepOutcome::Succeeded => None,
            StepOutcome::Failed => Some(RunError::StepExecution {
                step,
                name,
                exit_code,
            }),
            StepOutcome::MissingDisplay => Some(RunError::MissingDisplay {
                step,
                name,
                exit_code,
            }),
            StepOutcome::SpawnFailed => Some(RunError::Spawn {
                step,
                name,
                message: self.capture.stderr.trim().to_string(),
            }),
            StepOutcome::Interrupted => Some(RunError::Interrupted { step }),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

pub trait StepRunner {
    /// Run one resolved step to completion (or cancellation).
    ///
    /// Step failures are reported through the returned `StepResult`; `Err` is
    /// reserved for problems preparing the run (output directories, waiting).
    fn run(
        &mut self,
        step: &'static Step,
        command: &ResolvedCommand,
        ctx: &RunContext,
        cancel: &CancelToken,
    ) -> Result<StepResult, RunError>;
}

/// Runs steps as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    display_available: bool,
}

impl ProcessRunner {
    /// Runner that probes the current environment for a display.
    pub fn from_env() -> Self {
        Self {
            display_available: display_available(|key| std::env::var_os(key)),
        }
    }

    #[cfg(test)]
    pub fn with_display(display_available: bool) -> Self {
        Self { display_available }
    }
}

impl StepRunner for ProcessRunner {
    fn run(
        &mut self,
        step: &'static Step,
        command: &ResolvedCommand,
        ctx: &RunContext,
        cancel: &CancelToken,
    ) -> Result<StepResult, RunError> {
        if let Some(rel) = step.output_dir {
            ensure_output_dir(&ctx.workdir, rel)?;
        }

        let gui = ctx.gui_enabled_for(step);
        let start = Instant::now();
        let finish = |exit_code: i32, capture: Capture, outcome: StepOutcome| StepResult {
            step_id: step.id,
            name: step.name,
            command: command.clone(),
            exit_code,
            duration: start.elapsed(),
            capture,
            outcome,
        };

        if gui && !self.display_available {
            tracing::warn!(step = %step.id, "GUI requested but no display is available");
            let capture = Capture {
                stdout: String::new(),
                stderr: format!(
                    "no display available for GUI step {} ({}): set {} or pass --gui-steps ''",
                    step.id,
                    step.name,
                    DISPLAY_ENV_VARS.join(" or ")
                ),
            };
            return Ok(finish(EXIT_UNAVAILABLE, capture, StepOutcome::MissingDisplay));
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&ctx.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so cancellation reaches anything the step forks.
            cmd.process_group(0);
        }
        let spawned = cmd.spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(step = %step.id, program = %command.program, %err, "spawn failed");
                let capture = Capture {
                    stdout: String::new(),
                    stderr: format!("spawn {}: {err}", command.program),
                };
                return Ok(finish(EXIT_SPAWN_FAILED, capture, StepOutcome::SpawnFailed));
            }
        };
        tracing::debug!(step = %step.id, pid = child.id(), "step started");

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let status = wait_or_cancel(&mut child, cancel)
            .map_err(|err| RunError::io(&command.program, err))?;
        let capture = Capture {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        let result = match status {
            None => finish(EXIT_INTERRUPTED, capture, StepOutcome::Interrupted),
            Some(status) => {
                let exit_code = exit_code_of(&status);
                let outcome = if exit_code == 0 {
                    StepOutcome::Succeeded
                } else if gui && reports_missing_display(&capture) {
                    StepOutcome::MissingDisplay
                } else {
                    StepOutcome::Failed
                };
                finish(exit_code, capture, outcome)
            }
        };
        tracing::info!(
            step = %step.id,
            exit_code = result.exit_code,
            elapsed_ms = result.duration.as_millis(),
            outcome = ?result.outcome,
            "step finished"
        );
        Ok(result)
    }
}

/// Block until the child exits; `None` means it was killed on cancellation.
fn wait_or_cancel(child: &mut Child, cancel: &CancelToken) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            tracing::warn!(pid = child.id(), "interrupt received, terminating step");
            terminate(child)?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        // The step leads its own process group, so this reaches anything it forked.
        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                tracing::debug!(pid, %err, "process group already gone");
            }
        }
    }
    // The child may have exited between the two checks.
    let _ = child.kill();
    child.wait().map(|_| ())
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        // A read error just truncates the capture.
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Exit code, or `128 + signal` for a child killed by a signal.
fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn display_available(lookup: impl Fn(&str) -> Option<OsString>) -> bool {
    if cfg!(any(target_os = "macos", windows)) {
        return true;
    }
    DISPLAY_ENV_VARS
        .iter()
        .any(|key| lookup(key).is_some_and(|value| !value.is_empty()))
}

fn reports_missing_display(capture: &Capture) -> bool {
    [&capture.stderr, &capture.stdout].iter().any(|text| {
        let lower = text.to_lowercase();
        DISPLAY_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
