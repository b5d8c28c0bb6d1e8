use super::*;
use crate::context::test_context;
use crate::registry;

fn step(id: u8) -> &'static Step {
    registry::lookup(StepId::new(id)).expect("registry step")
}

fn shell(step: &Step, script: &str) -> ResolvedCommand {
    ResolvedCommand {
        step_id: step.id,
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

fn run_shell(step_id: u8, script: &str, display: bool) -> (tempfile::TempDir, StepResult) {
    let temp = tempfile::tempdir().expect("tempdir");
    let ctx = test_context(temp.path());
    let step = step(step_id);
    let result = ProcessRunner::with_display(display)
        .run(step, &shell(step, script), &ctx, &CancelToken::default())
        .expect("run step");
    (temp, result)
}

#[cfg(unix)]
#[test]
fn captures_both_streams_and_exit_code() {
    let (_temp, result) = run_shell(4, "echo out; echo err >&2; exit 3", true);
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.outcome, StepOutcome::Failed);
    assert_eq!(result.capture.stdout, "out\n");
    assert_eq!(result.capture.stderr, "err\n");
    assert!(matches!(
        result.error(),
        Some(RunError::StepExecution { exit_code: 3, .. })
    ));
}

#[cfg(unix)]
#[test]
fn zero_exit_is_success() {
    let (_temp, result) = run_shell(4, "true", true);
    assert!(result.succeeded());
    assert!(result.error().is_none());
}

#[cfg(unix)]
#[test]
fn runs_in_the_workdir() {
    let (temp, result) = run_shell(4, "pwd", true);
    let reported = std::path::PathBuf::from(result.capture.stdout.trim());
    let expected = temp.path().canonicalize().expect("canonical temp");
    assert_eq!(reported.canonicalize().expect("canonical pwd"), expected);
}

#[cfg(unix)]
#[test]
fn creates_declared_output_dir_before_spawning() {
    let (temp, result) = run_shell(5, "test -d Output/run_all", true);
    assert!(result.succeeded(), "stderr: {}", result.capture.stderr);
    assert!(temp.path().join("Output/run_all").is_dir());
}

#[cfg(unix)]
#[test]
fn signal_death_maps_to_128_plus_signal() {
    let (_temp, result) = run_shell(4, "kill -9 $$", true);
    assert_eq!(result.exit_code, 128 + 9);
    assert_eq!(result.outcome, StepOutcome::Failed);
}

#[test]
fn gui_step_without_display_fails_before_spawning() {
    let (temp, result) = run_shell(2, "touch spawned", false);
    assert_eq!(result.outcome, StepOutcome::MissingDisplay);
    assert_eq!(result.exit_code, EXIT_UNAVAILABLE);
    assert!(!temp.path().join("spawned").exists());
    let err = result.error().expect("missing display error");
    assert!(err.to_string().contains("step 2 (analyze_chars)"));
}

#[cfg(unix)]
#[test]
fn gui_step_reporting_display_error_is_missing_display() {
    let (_temp, result) = run_shell(
        3,
        "echo '_tkinter.TclError: no display name and no $DISPLAY environment variable' >&2; exit 1",
        true,
    );
    assert_eq!(result.outcome, StepOutcome::MissingDisplay);
    assert_eq!(result.exit_code, 1);
}

#[cfg(unix)]
#[test]
fn display_markers_ignored_when_gui_not_requested() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut ctx = test_context(temp.path());
    ctx.gui_enabled_steps.clear();
    let step = step(3);
    let result = ProcessRunner::with_display(true)
        .run(
            step,
            &shell(step, "echo 'cannot open display' >&2; exit 1"),
            &ctx,
            &CancelToken::default(),
        )
        .expect("run");
    assert_eq!(result.outcome, StepOutcome::Failed);
}

#[test]
fn missing_program_is_spawn_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let ctx = test_context(temp.path());
    let step = step(4);
    let command = ResolvedCommand {
        step_id: step.id,
        program: "run-all-no-such-interpreter".to_string(),
        args: Vec::new(),
    };
    let result = ProcessRunner::with_display(true)
        .run(step, &command, &ctx, &CancelToken::default())
        .expect("run");
    assert_eq!(result.outcome, StepOutcome::SpawnFailed);
    assert_eq!(result.exit_code, EXIT_SPAWN_FAILED);
    assert!(matches!(result.error(), Some(RunError::Spawn { .. })));
}

#[cfg(unix)]
#[test]
fn cancellation_kills_the_running_child() {
    let temp = tempfile::tempdir().expect("tempdir");
    let ctx = test_context(temp.path());
    let step = step(4);
    let cancel = CancelToken::default();
    cancel.cancel();
    let started = Instant::now();
    let result = ProcessRunner::with_display(true)
        .run(step, &shell(step, "sleep 30"), &ctx, &cancel)
        .expect("run");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.outcome, StepOutcome::Interrupted);
    assert_eq!(result.exit_code, EXIT_INTERRUPTED);
}

#[test]
fn display_probe_reads_display_variables() {
    if cfg!(any(target_os = "macos", windows)) {
        return;
    }
    assert!(!display_available(|_| None));
    assert!(!display_available(|_| Some(OsString::new())));
    assert!(display_available(|key| {
        (key == "WAYLAND_DISPLAY").then(|| OsString::from("wayland-0"))
    }));
}
