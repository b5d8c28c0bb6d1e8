//! CLI argument parsing for the pipeline orchestrator.
//!
//! Selector values are kept as raw strings here; `RunContext::from_args`
//! validates them against the registry so every input error surfaces as the
//! same `InvalidArgument` kind before anything runs.
use clap::Parser;
use std::path::PathBuf;

/// GUI selector used when `--gui-steps` is not given.
pub const DEFAULT_GUI_STEPS: &str = "2,3";

/// Log directory used when `--log-dir` is not given (relative to the workdir).
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_TOP: u32 = 50;

/// Root CLI entrypoint: one invocation is one pipeline run.
#[derive(Parser, Debug)]
#[command(
    name = "run-all",
    version,
    about = "Run pipeline steps 1..6 (or a subset) as one coordinated, logged run",
    after_help = "Examples:\n  run-all\n  run-all --steps 4,5,6 --seed 42\n  run-all --steps 2,5 --gui-steps '' --dry-run\n  run-all --continue-on-error --log-dir /tmp/run-logs"
)]
pub struct RootArgs {
    /// Print resolved commands only, do not execute
    #[arg(long)]
    pub dry_run: bool,

    /// Steps to run, as a comma separated list of ids (default: all)
    #[arg(long, value_name = "IDS")]
    pub steps: Option<String>,

    /// Steps to show a GUI for (comma separated); empty disables GUI everywhere
    #[arg(long, value_name = "IDS", default_value = DEFAULT_GUI_STEPS)]
    pub gui_steps: String,

    /// Seed passed to the generation step for reproducible output
    #[arg(long, value_name = "INT", allow_hyphen_values = true)]
    pub seed: Option<String>,

    /// Top-N shown by the analysis steps
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP)]
    pub top: u32,

    /// Do not overwrite existing processed outputs
    #[arg(long)]
    pub no_overwrite: bool,

    /// Continue with the next step when a step fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Directory for the run log (relative paths resolve against the workdir)
    #[arg(long, value_name = "DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Project root the steps run in (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Interpreter command for the step scripts (env: RUN_ALL_PYTHON)
    #[arg(long, value_name = "CMD")]
    pub python: Option<String>,

    /// Write the run summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Emit debug diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,
}
