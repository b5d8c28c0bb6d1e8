//! Shared test infrastructure for integration tests.
//!
//! A `PipelineFixture` is a throwaway project root with the six step scripts in
//! place. The scripts are POSIX shell, run through `--python sh`, and append
//! each invocation to `calls.log` so tests can see what actually executed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const STEP_SCRIPTS: &[(u8, &str)] = &[
    (1, "scripts/process1/process_unprocessed.py"),
    (2, "scripts/process2/analyze_chars.py"),
    (3, "scripts/process3/analyze_ngrams.py"),
    (4, "scripts/process4/build_all_text.py"),
    (5, "scripts/process5/generate_ngrams.py"),
    (6, "scripts/process6/generate_markov.py"),
];

/// Project root populated with stand-in step scripts.
pub struct PipelineFixture {
    temp: TempDir,
}

/// Exit code and captured streams of one `run-all` invocation.
pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl PipelineFixture {
    pub fn setup() -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");
        for (id, rel) in STEP_SCRIPTS {
            let path = temp.path().join(rel);
            std::fs::create_dir_all(path.parent().expect("script parent")).expect("script dir");
            std::fs::write(&path, step_script(*id)).expect("write step script");
        }
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// `run-all` rooted at the fixture, with a clean interpreter setup.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_run-all"));
        cmd.current_dir(self.root())
            .arg("--workdir")
            .arg(self.root())
            .args(["--python", "sh"])
            .env_remove("RUN_ALL_PYTHON")
            .env_remove("RUST_LOG")
            .env_remove("FAIL_STEP")
            .env_remove("FAIL_CODE")
            .env_remove("SLEEP_STEP");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> RunOutput {
        self.command()
            .args(args)
            .output()
            .expect("run run-all")
            .into()
    }

    /// Step ids in the order their scripts ran.
    pub fn calls(&self) -> Vec<u8> {
        std::fs::read_to_string(self.root().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.split_whitespace().next()?.parse().ok())
            .collect()
    }

    /// Arguments a given step was called with, if it ran.
    pub fn call_args(&self, step: u8) -> Option<String> {
        std::fs::read_to_string(self.root().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .find_map(|line| {
                let (id, args) = line.split_once(' ').unwrap_or((line, ""));
                (id.parse::<u8>().ok() == Some(step)).then(|| args.to_string())
            })
    }

    pub fn log_files(&self, dir: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.root().join(dir)) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
            .collect();
        files.sort();
        files
    }

    /// Content of the only run log under `logs/`.
    pub fn run_log(&self) -> String {
        let files = self.log_files("logs");
        assert_eq!(files.len(), 1, "expected one run log, found {files:?}");
        std::fs::read_to_string(&files[0]).expect("read run log")
    }
}

/// Records the call, writes `--out` if given, hangs when `SLEEP_STEP` names it,
/// and fails when `FAIL_STEP` names it.
fn step_script(id: u8) -> String {
    format!(
        r#"args="$*"
echo "{id} $args" >> calls.log
echo "step {id} ran"
if [ "${{SLEEP_STEP:-}}" = "{id}" ]; then sleep 30; fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--out" ]; then out="$2"; fi
  shift
done
if [ -n "$out" ]; then echo "step {id}: $args" > "$out"; fi
if [ "${{FAIL_STEP:-}}" = "{id}" ]; then
  echo "step {id} broke" >&2
  exit "${{FAIL_CODE:-1}}"
fi
"#
    )
}
