//! Run configuration derived from parsed arguments.
//!
//! `RunContext` is built once per invocation and threaded read-only through
//! every component. Building it is the only place user input is validated, so
//! a bad selector or seed fails before the log is opened or a step starts.
use crate::cli::RootArgs;
use crate::error::RunError;
use crate::registry::{self, Step, StepId, REGISTRY};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `--python` is not given.
pub const PYTHON_ENV_VAR: &str = "RUN_ALL_PYTHON";

const INTERPRETER_CANDIDATES: &[&str] = &["python3", "python"];

#[derive(Debug, Clone)]
pub struct RunContext {
    pub dry_run: bool,
    pub requested_steps: BTreeSet<StepId>,
    pub gui_enabled_steps: BTreeSet<StepId>,
    pub seed: Option<i64>,
    pub log_path: PathBuf,
    pub top: u32,
    pub overwrite: bool,
    pub continue_on_error: bool,
    /// Interpreter argv prefix for every step (e.g. `["python3"]`).
    pub interpreter: Vec<String>,
    pub workdir: PathBuf,
    pub summary_json: Option<PathBuf>,
    pub started_at: DateTime<Local>,
}

/// Process-level inputs captured once at startup.
#[derive(Debug, Clone)]
pub struct Ambient {
    pub cwd: PathBuf,
    pub python_override: Option<String>,
    pub started_at: DateTime<Local>,
}

impl Ambient {
    pub fn capture() -> Result<Self, RunError> {
        let cwd = std::env::current_dir().map_err(|err| RunError::io(".", err))?;
        Ok(Self {
            cwd,
            python_override: std::env::var(PYTHON_ENV_VAR)
                .ok()
                .filter(|value| !value.trim().is_empty()),
            started_at: Local::now(),
        })
    }
}

impl RunContext {
    pub fn from_args(args: &RootArgs, ambient: &Ambient) -> Result<Self, RunError> {
        let requested_steps = match args.steps.as_deref() {
            Some(raw) => parse_step_list(raw, "--steps")?,
            None => REGISTRY.iter().map(|step| step.id).collect(),
        };
        let gui_enabled_steps = parse_step_list(&args.gui_steps, "--gui-steps")?;
        let seed = args.seed.as_deref().map(parse_seed).transpose()?;

        let workdir = match args.workdir.as_deref() {
            Some(dir) => absolutize(dir, &ambient.cwd),
            None => ambient.cwd.clone(),
        };
        if !workdir.is_dir() {
            return Err(RunError::invalid(format!(
                "--workdir {} is not a directory",
                workdir.display()
            )));
        }
        let log_dir = absolutize(&args.log_dir, &workdir);
        let log_path = log_dir.join(log_file_name(&ambient.started_at));

        let interpreter = resolve_interpreter(
            args.python.as_deref(),
            ambient.python_override.as_deref(),
        )?;

        Ok(Self {
            dry_run: args.dry_run,
            requested_steps,
            gui_enabled_steps,
            seed,
            log_path,
            top: args.top,
            overwrite: !args.no_overwrite,
            continue_on_error: args.continue_on_error,
            interpreter,
            workdir,
            summary_json: args
                .summary_json
                .as_deref()
                .map(|path| absolutize(path, &ambient.cwd)),
            started_at: ambient.started_at,
        })
    }

    /// A step gets `--gui` only when it was selected and can actually show one.
    pub fn gui_enabled_for(&self, step: &Step) -> bool {
        step.supports_gui && self.gui_enabled_steps.contains(&step.id)
    }

    pub fn selects_seeded_step(&self) -> bool {
        self.requested_steps
            .iter()
            .filter_map(|id| registry::lookup(*id))
            .any(Step::declares_seed)
    }

    /// GUI-selected ids whose steps have no GUI to show.
    pub fn ignored_gui_steps(&self) -> Vec<StepId> {
        self.gui_enabled_steps
            .iter()
            .copied()
            .filter(|id| registry::lookup(*id).is_some_and(|step| !step.supports_gui))
            .collect()
    }
}

/// Context with the stock defaults, rooted at `workdir`.
#[cfg(test)]
pub(crate) fn test_context(workdir: &Path) -> RunContext {
    RunContext {
        dry_run: false,
        requested_steps: REGISTRY.iter().map(|step| step.id).collect(),
        gui_enabled_steps: [2, 3].into_iter().map(StepId::new).collect(),
        seed: None,
        log_path: workdir.join("logs").join("run_all_test.log"),
        top: crate::cli::DEFAULT_TOP,
        overwrite: true,
        continue_on_error: false,
        interpreter: vec!["python3".to_string()],
        workdir: workdir.to_path_buf(),
        summary_json: None,
        started_at: Local::now(),
    }
}

/// Parse a comma-separated list of registry ids.
///
/// Only discrete ids are accepted; empty tokens are skipped and duplicates
/// collapse. Ranges such as `1-3` are rejected.
pub fn parse_step_list(raw: &str, label: &str) -> Result<BTreeSet<StepId>, RunError> {
    let mut ids = BTreeSet::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token.contains('-') && !token.starts_with('-') {
            return Err(RunError::invalid(format!(
                "{label}: ranges are not supported ({token:?}); list ids as 1,2,3"
            )));
        }
        let value: u32 = token.parse().map_err(|_| {
            RunError::invalid(format!("{label}: {token:?} is not a step id"))
        })?;
        let id = u8::try_from(value)
            .ok()
            .map(StepId::new)
            .filter(|id| registry::lookup(*id).is_some())
            .ok_or_else(|| {
                RunError::invalid(format!(
                    "{label}: unknown step id {value} (known: {})",
                    registry::known_ids()
                ))
            })?;
        ids.insert(id);
    }
    Ok(ids)
}

pub fn parse_seed(raw: &str) -> Result<i64, RunError> {
    raw.trim()
        .parse()
        .map_err(|_| RunError::invalid(format!("--seed must be an integer (got {raw:?})")))
}

/// `run_all_<YYYYmmdd_HHMMSS>.log`, named after the run start.
pub fn log_file_name(started_at: &DateTime<Local>) -> String {
    format!("run_all_{}.log", started_at.format("%Y%m%d_%H%M%S"))
}

/// Resolve the interpreter with fallback: explicit flag > env var > PATH lookup.
fn resolve_interpreter(explicit: Option<&str>, env: Option<&str>) -> Result<Vec<String>, RunError> {
    let Some(command) = explicit.or(env) else {
        return Ok(vec![detect_interpreter()]);
    };
    let argv = shell_words::split(command)
        .map_err(|err| RunError::invalid(format!("--python {command:?}: {err}")))?;
    if argv.is_empty() {
        return Err(RunError::invalid("--python must not be empty"));
    }
    Ok(argv)
}

fn detect_interpreter() -> String {
    INTERPRETER_CANDIDATES
        .iter()
        .find(|name| which::which(name).is_ok())
        .unwrap_or(&INTERPRETER_CANDIDATES[0])
        .to_string()
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
