//! Run-level control flow.
//!
//! ```text
//! INIT -> PLANNING -> DRY_RUN   -> COMPLETED
//!                  -> EXECUTING -> COMPLETED | ABORTED
//! ```
//!
//! Inside `EXECUTING` each step moves `PENDING -> RUNNING -> SUCCEEDED | FAILED`.
//! A failed step aborts the run unless continue-on-error is set; an interrupt
//! always aborts. Steps never overlap: the next step is not resolved until the
//! previous child has exited.
use crate::context::RunContext;
use crate::dry_run::DryRunRenderer;
use crate::error::RunError;
use crate::exec::{StepOutcome, StepResult, StepRunner};
use crate::plan::{build_plan, ExecutionPlan};
use crate::registry::StepId;
use crate::resolve::resolve_command;
use crate::runlog::RunLogger;
use crate::signal::CancelToken;
use serde::Serialize;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Planning,
    DryRun,
    Executing,
    Completed,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Planning => write!(f, "PLANNING"),
            Self::DryRun => write!(f, "DRY_RUN"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Final account of a run, finalized once the plan is exhausted or aborted.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub plan: Vec<StepId>,
    pub results: Vec<StepResult>,
    /// Planned steps that never started.
    pub skipped: Vec<StepId>,
    pub state: RunState,
    pub dry_run: bool,
    pub overall_exit_code: i32,
    /// Message of the failure that decided the exit code.
    pub failure: Option<String>,
}

impl RunSummary {
    pub fn failed_results(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|result| !result.succeeded())
    }
}

pub struct Orchestrator<'a, R: StepRunner, W: Write> {
    ctx: &'a RunContext,
    runner: &'a mut R,
    logger: &'a mut RunLogger<W>,
    cancel: CancelToken,
    state: RunState,
}

impl<'a, R: StepRunner, W: Write> Orchestrator<'a, R, W> {
    pub fn new(
        ctx: &'a RunContext,
        runner: &'a mut R,
        logger: &'a mut RunLogger<W>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            ctx,
            runner,
            logger,
            cancel,
            state: RunState::Init,
        }
    }

    /// Plan, then either print or execute the plan, and log the summary.
    ///
    /// `Err` means the run log itself (or the dry-run output) could not be
    /// written; step failures are reported through the summary.
    pub fn run<P: Write>(
        &mut self,
        printer: &mut DryRunRenderer<P>,
    ) -> Result<RunSummary, RunError> {
        self.transition(RunState::Planning);
        let plan = build_plan(&self.ctx.requested_steps);
        tracing::info!(steps = ?plan.ids(), dry_run = self.ctx.dry_run, "plan built");
        self.logger.run_started(self.ctx, &plan)?;

        let summary = if self.ctx.dry_run {
            self.transition(RunState::DryRun);
            self.print_plan(&plan, printer)?
        } else {
            self.transition(RunState::Executing);
            self.execute(&plan)?
        };
        self.logger.summary(&summary)?;
        Ok(summary)
    }

    fn print_plan<P: Write>(
        &mut self,
        plan: &ExecutionPlan,
        printer: &mut DryRunRenderer<P>,
    ) -> Result<RunSummary, RunError> {
        for step in plan.steps() {
            let command = resolve_command(step, self.ctx);
            printer.render(&command)?;
            self.logger.dry_run_step(step, &command)?;
        }
        self.transition(RunState::Completed);
        Ok(self.finish(plan, Vec::new(), None))
    }

    fn execute(&mut self, plan: &ExecutionPlan) -> Result<RunSummary, RunError> {
        let mut results: Vec<StepResult> = Vec::with_capacity(plan.len());
        let mut first_failure: Option<RunError> = None;
        let mut aborted = false;

        for step in plan.steps() {
            if self.cancel.is_cancelled() {
                self.logger
                    .note(&format!("Interrupted before STEP {}", step.id))?;
                first_failure =
                    first_failure.or(Some(RunError::InterruptedBefore { step: step.id }));
                aborted = true;
                break;
            }

            let command = resolve_command(step, self.ctx);
            step_transition(step.id, StepState::Pending, StepState::Running);
            self.logger.step_started(step, &command)?;

            let result = match self.runner.run(step, &command, self.ctx, &self.cancel) {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(step = %step.id, %err, "step could not run");
                    self.logger.step_error(step, &err)?;
                    self.logger.note("Aborting due to failure")?;
                    first_failure = first_failure.or(Some(err));
                    aborted = true;
                    break;
                }
            };
            self.logger.step_finished(&result)?;

            let interrupted = result.outcome == StepOutcome::Interrupted;
            let error = result.error();
            results.push(result);
            let Some(err) = error else {
                step_transition(step.id, StepState::Running, StepState::Succeeded);
                continue;
            };
            step_transition(step.id, StepState::Running, StepState::Failed);
            tracing::warn!(step = ?err.step(), exit_code = err.exit_code(), %err, "step failed");
            first_failure = first_failure.or(Some(err));
            if interrupted || !self.ctx.continue_on_error {
                self.logger.note("Aborting due to failure")?;
                aborted = true;
                break;
            }
            self.logger
                .note("Continuing despite failure as requested")?;
        }

        self.transition(if aborted {
            RunState::Aborted
        } else {
            RunState::Completed
        });
        Ok(self.finish(plan, results, first_failure))
    }

    fn finish(
        &self,
        plan: &ExecutionPlan,
        results: Vec<StepResult>,
        failure: Option<RunError>,
    ) -> RunSummary {
        let skipped = if self.ctx.dry_run {
            Vec::new()
        } else {
            plan.ids().into_iter().skip(results.len()).collect()
        };
        RunSummary {
            plan: plan.ids(),
            results,
            skipped,
            state: self.state,
            dry_run: self.ctx.dry_run,
            overall_exit_code: failure.as_ref().map_or(0, RunError::exit_code),
            failure: failure.map(|err| err.to_string()),
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }
}

fn step_transition(step: StepId, from: StepState, to: StepState) {
    tracing::debug!(%step, ?from, ?to, "step state");
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
