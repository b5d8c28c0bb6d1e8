//! Error taxonomy for a pipeline run.
//!
//! Every variant maps to a process exit code so the orchestrator can report
//! failures without re-inspecting the cause.
use crate::registry::StepId;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for malformed command-line input (matches clap usage errors).
pub const EXIT_INVALID_ARGUMENT: i32 = 2;
/// Exit code when a step program cannot be started.
pub const EXIT_SPAWN_FAILED: i32 = 127;
/// Exit code after an external interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;
/// Exit code when a GUI step cannot reach a display (sysexits `EX_UNAVAILABLE`).
pub const EXIT_UNAVAILABLE: i32 = 69;
/// Exit code for log or output-directory I/O failures (sysexits `EX_IOERR`).
pub const EXIT_IO_ERROR: i32 = 74;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("step {step} ({name}) needs a display but none is available")]
    MissingDisplay {
        step: StepId,
        name: &'static str,
        /// Step exit code, or `EXIT_UNAVAILABLE` when caught before spawning.
        exit_code: i32,
    },

    #[error("step {step} ({name}) failed (rc={exit_code})")]
    StepExecution {
        step: StepId,
        name: &'static str,
        exit_code: i32,
    },

    #[error("step {step} ({name}) could not be started: {message}")]
    Spawn {
        step: StepId,
        name: &'static str,
        message: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted while running step {step}")]
    Interrupted { step: StepId },

    #[error("interrupted before step {step} started")]
    InterruptedBefore { step: StepId },
}

impl RunError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code the whole invocation should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => EXIT_INVALID_ARGUMENT,
            Self::MissingDisplay { exit_code, .. } | Self::StepExecution { exit_code, .. } => {
                *exit_code
            }
            Self::Spawn { .. } => EXIT_SPAWN_FAILED,
            Self::Io { .. } => EXIT_IO_ERROR,
            Self::Interrupted { .. } | Self::InterruptedBefore { .. } => EXIT_INTERRUPTED,
        }
    }

    /// Step the error is attributed to, if any.
    pub fn step(&self) -> Option<StepId> {
        match self {
            Self::MissingDisplay { step, .. }
            | Self::StepExecution { step, .. }
            | Self::Spawn { step, .. }
            | Self::Interrupted { step } => Some(*step),
            Self::InvalidArgument(_) | Self::Io { .. } | Self::InterruptedBefore { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_exits_with_step_code() {
        let err = RunError::StepExecution {
            step: StepId::new(3),
            name: "analyze_ngrams",
            exit_code: 7,
        };
        assert_eq!(err.exit_code(), 7);
        assert_eq!(err.step(), Some(StepId::new(3)));
    }

    #[test]
    fn missing_display_names_the_step() {
        let err = RunError::MissingDisplay {
            step: StepId::new(2),
            name: "analyze_chars",
            exit_code: EXIT_UNAVAILABLE,
        };
        assert_eq!(err.exit_code(), EXIT_UNAVAILABLE);
        assert!(err.to_string().contains("step 2 (analyze_chars)"));
    }

    #[test]
    fn spawn_failure_uses_command_not_found_code() {
        let err = RunError::Spawn {
            step: StepId::new(1),
            name: "process_unprocessed",
            message: "No such file or directory".to_string(),
        };
        assert_eq!(err.exit_code(), EXIT_SPAWN_FAILED);
    }

    #[test]
    fn pre_execution_errors_have_no_step() {
        let err = RunError::invalid("unknown step id 9");
        assert_eq!(err.exit_code(), EXIT_INVALID_ARGUMENT);
        assert!(err.step().is_none());
    }

    #[test]
    fn interrupt_between_steps_names_the_step_that_never_ran() {
        let err = RunError::InterruptedBefore {
            step: StepId::new(2),
        };
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(err.to_string(), "interrupted before step 2 started");
        assert!(err.step().is_none());
    }

    #[test]
    fn io_error_uses_sysexits_code() {
        let err = RunError::io(
            "logs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.exit_code(), 74);
        assert_eq!(EXIT_UNAVAILABLE, 69);
    }
}
