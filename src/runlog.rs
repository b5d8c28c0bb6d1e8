//! Human-readable, append-only record of one pipeline run.
//!
//! The logger is generic over its writer: production runs write a
//! timestamp-named file under the log directory, tests write into a `Vec<u8>`.
//! Every record is flushed as soon as it is written so an aborted or crashed
//! run still leaves a readable partial log.
//!
//! # Log Format
//!
//! ```text
//! run_all start: 2025-03-09T14:05:07+09:00
//! mode=execute steps=[1, 2] gui_steps=[2, 3] top=50 overwrite=true seed=none continue_on_error=false
//!
//! --- STEP 1 process_unprocessed ---
//! CMD: python3 scripts/process1/process_unprocessed.py --overwrite
//! [stdout]
//! ...
//! RETURNCODE: 0
//! ELAPSED: 0.412s
//!
//! === SUMMARY ===
//! ```
use crate::context::RunContext;
use crate::error::RunError;
use crate::exec::StepResult;
use crate::orchestrator::RunSummary;
use crate::plan::ExecutionPlan;
use crate::registry::{self, Step, StepId};
use crate::resolve::ResolvedCommand;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunLogger<W: Write> {
    out: W,
    target: PathBuf,
}

impl RunLogger<File> {
    /// Open the run log, creating its directory first.
    pub fn create(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| RunError::io(parent, err))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| RunError::io(path, err))?;
        Ok(Self {
            out: file,
            target: path.to_path_buf(),
        })
    }
}

impl<W: Write> RunLogger<W> {
    /// Logger over an arbitrary writer; `label` names it in I/O errors.
    #[cfg(test)]
    pub fn new(out: W, label: impl Into<PathBuf>) -> Self {
        Self {
            out,
            target: label.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn run_started(&mut self, ctx: &RunContext, plan: &ExecutionPlan) -> Result<(), RunError> {
        let mut text = format!("run_all start: {}\n", ctx.started_at.to_rfc3339());
        if ctx.dry_run {
            text.push_str("DRY-RUN REPORT: commands were resolved but not executed\n");
        }
        text.push_str(&format!(
            "mode={} steps={} gui_steps={} top={} overwrite={} seed={} continue_on_error={}\n",
            if ctx.dry_run { "dry-run" } else { "execute" },
            id_list(&plan.ids()),
            id_list(&ctx.gui_enabled_steps.iter().copied().collect::<Vec<_>>()),
            ctx.top,
            ctx.overwrite,
            ctx.seed
                .map(|seed| seed.to_string())
                .unwrap_or_else(|| "none".to_string()),
            ctx.continue_on_error,
        ));
        text.push_str(&format!("workdir={}\n", ctx.workdir.display()));
        if plan.is_empty() {
            text.push_str("plan is empty; nothing to run\n");
        }
        self.write_record(&text)
    }

    /// Header written before a step is spawned, so a hang still shows which step ran.
    pub fn step_started(&mut self, step: &Step, command: &ResolvedCommand) -> Result<(), RunError> {
        self.write_record(&format!(
            "\n--- STEP {} {} ---\nCMD: {command}\n",
            step.id, step.name
        ))
    }

    pub fn dry_run_step(&mut self, step: &Step, command: &ResolvedCommand) -> Result<(), RunError> {
        self.step_started(step, command)?;
        self.write_record("RETURNCODE: 0 (dry-run)\n")
    }

    pub fn step_finished(&mut self, result: &StepResult) -> Result<(), RunError> {
        let mut text = String::new();
        push_stream(&mut text, "stdout", &result.capture.stdout);
        push_stream(&mut text, "stderr", &result.capture.stderr);
        text.push_str(&format!("RETURNCODE: {}\n", result.exit_code));
        text.push_str(&format!("ELAPSED: {:.3}s\n", result.duration.as_secs_f64()));
        if let Some(err) = result.error() {
            text.push_str(&format!("STEP {} failed: {err}\n", result.step_id));
        }
        self.write_record(&text)
    }

    /// Error raised around a step rather than by it (e.g. its output directory).
    pub fn step_error(&mut self, step: &Step, err: &RunError) -> Result<(), RunError> {
        self.write_record(&format!("STEP {} error: {err}\n", step.id))
    }

    pub fn note(&mut self, line: &str) -> Result<(), RunError> {
        self.write_record(&format!("{line}\n"))
    }

    pub fn summary(&mut self, summary: &RunSummary) -> Result<(), RunError> {
        let run: Vec<StepId> = summary.results.iter().map(|result| result.step_id).collect();
        let mut text = String::from("\n=== SUMMARY ===\n");
        text.push_str(&format!("state={}\n", summary.state));
        if summary.dry_run {
            text.push_str(&format!(
                "steps_printed={} {}\n",
                summary.plan.len(),
                id_list(&summary.plan)
            ));
        } else {
            text.push_str(&format!("steps_run={} {}\n", run.len(), id_list(&run)));
        }
        text.push_str(&format!(
            "steps_skipped={} {}\n",
            summary.skipped.len(),
            id_list(&summary.skipped)
        ));
        for id in &summary.skipped {
            let name = registry::lookup(*id).map_or("unknown", |step| step.name);
            text.push_str(&format!("STEP {id} {name}: not run\n"));
        }
        if let Some(failure) = &summary.failure {
            text.push_str(&format!("failure: {failure}\n"));
        }
        text.push_str(&format!("overall_exit_code={}\n", summary.overall_exit_code));
        text.push_str(&format!("run_all finished: {}\n", Local::now().to_rfc3339()));
        self.write_record(&text)
    }

    fn write_record(&mut self, text: &str) -> Result<(), RunError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|err| RunError::io(&self.target, err))
    }
}

fn push_stream(text: &mut String, label: &str, content: &str) {
    if content.is_empty() {
        return;
    }
    text.push_str(&format!("[{label}]\n"));
    text.push_str(content);
    if !content.ends_with('\n') {
        text.push('\n');
    }
}

fn id_list(ids: &[StepId]) -> String {
    let joined = ids
        .iter()
        .map(StepId::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}
