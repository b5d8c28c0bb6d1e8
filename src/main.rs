use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod context;
mod dry_run;
mod error;
mod exec;
mod orchestrator;
mod outdir;
mod plan;
mod registry;
mod resolve;
mod runlog;
mod signal;

use cli::RootArgs;
use context::{Ambient, RunContext};
use dry_run::DryRunRenderer;
use exec::ProcessRunner;
use orchestrator::{Orchestrator, RunSummary};
use runlog::RunLogger;
use signal::CancelToken;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("run-all: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "run_all=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(args: &RootArgs) -> Result<i32> {
    let ambient = match Ambient::capture() {
        Ok(ambient) => ambient,
        Err(err) => {
            eprintln!("run-all: {err}");
            return Ok(err.exit_code());
        }
    };
    let ctx = match RunContext::from_args(args, &ambient) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("run-all: {err}");
            return Ok(err.exit_code());
        }
    };
    for id in ctx.ignored_gui_steps() {
        tracing::warn!(step = %id, "GUI requested for a step without a GUI; ignoring");
    }
    if ctx.seed.is_some() && !ctx.selects_seeded_step() {
        tracing::warn!("--seed given but no selected step takes a seed");
    }
    if let Err(err) = signal::install() {
        tracing::warn!(%err, "could not install interrupt handlers");
    }

    let mut logger = match RunLogger::create(&ctx.log_path) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("run-all: cannot open run log: {err}");
            return Ok(err.exit_code());
        }
    };
    tracing::info!(log = %ctx.log_path.display(), "run log opened");

    let mut runner = ProcessRunner::from_env();
    let mut printer = DryRunRenderer::new(io::stdout().lock());
    let outcome = Orchestrator::new(&ctx, &mut runner, &mut logger, CancelToken::from_signals())
        .run(&mut printer);
    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("run-all: {err} (log: {})", logger.target().display());
            return Ok(err.exit_code());
        }
    };

    report(&summary, logger.target());
    if let Some(path) = &ctx.summary_json {
        write_json(path, &summary)
            .with_context(|| format!("write run summary {}", path.display()))?;
    }
    Ok(summary.overall_exit_code)
}

fn report(summary: &RunSummary, log: &Path) {
    for result in summary.failed_results() {
        if let Some(err) = result.error() {
            eprintln!("run-all: {err}");
        }
    }
    match &summary.failure {
        None => println!("run_all finished. Log: {}", log.display()),
        Some(failure) => eprintln!(
            "run_all {} ({failure}). Log: {}",
            summary.state.to_string().to_lowercase(),
            log.display()
        ),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
