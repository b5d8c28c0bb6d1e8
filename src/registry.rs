//! Static catalog of pipeline steps.
//!
//! Each step wraps one external program. Templates are typed so the resolver
//! can decide per argument whether it applies to a run, and so a step's GUI
//! and seed needs are visible from its definition alone.
use serde::Serialize;
use std::fmt;

/// Identifier of a registry step (1-based, contiguous).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StepId(u8);

impl StepId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[cfg(test)]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One element of a step's command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateArg {
    /// The configured interpreter (may expand to several tokens).
    Interpreter,
    Literal(&'static str),
    /// `--top <n>`
    Top,
    /// `--overwrite`, only when overwriting is enabled.
    Overwrite,
    /// `--gui`, only when the step is GUI-enabled for this run.
    Gui,
    /// `--seed <n>`, only when a seed was supplied.
    Seed,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    pub name: &'static str,
    pub template: &'static [TemplateArg],
    pub supports_gui: bool,
    /// Directory (relative to the workdir) the step writes into.
    pub output_dir: Option<&'static str>,
}

impl Step {
    pub fn declares_seed(&self) -> bool {
        self.template.contains(&TemplateArg::Seed)
    }
}

use self::TemplateArg::{Gui, Interpreter, Literal as L, Overwrite, Seed, Top};

/// Run-artifact directory for the non-interactive generation steps.
pub const RUN_ARTIFACT_DIR: &str = "Output/run_all";

pub static REGISTRY: [Step; 6] = [
    Step {
        id: StepId::new(1),
        name: "process_unprocessed",
        template: &[Interpreter, L("scripts/process1/process_unprocessed.py"), Overwrite],
        supports_gui: false,
        output_dir: Some("examples/processed"),
    },
    Step {
        id: StepId::new(2),
        name: "analyze_chars",
        template: &[
            Interpreter,
            L("scripts/process2/analyze_chars.py"),
            Top,
            L("--outdir"),
            L("Output/process2"),
            Gui,
        ],
        supports_gui: true,
        output_dir: Some("Output/process2"),
    },
    Step {
        id: StepId::new(3),
        name: "analyze_ngrams",
        template: &[
            Interpreter,
            L("scripts/process3/analyze_ngrams.py"),
            Top,
            L("--outdir"),
            L("Output/process3"),
            Gui,
        ],
        supports_gui: true,
        output_dir: Some("Output/process3"),
    },
    Step {
        id: StepId::new(4),
        name: "build_all_text",
        template: &[Interpreter, L("scripts/process4/build_all_text.py")],
        supports_gui: false,
        output_dir: None,
    },
    Step {
        id: StepId::new(5),
        name: "generate_ngrams",
        template: &[
            Interpreter,
            L("scripts/process5/generate_ngrams.py"),
            L("--ngram"),
            L("2"),
            L("--length"),
            L("200"),
            L("--alltext"),
            L("ALL_TEXT.txt"),
            L("--out"),
            L("Output/run_all/step5_ngram2.txt"),
        ],
        supports_gui: false,
        output_dir: Some(RUN_ARTIFACT_DIR),
    },
    Step {
        id: StepId::new(6),
        name: "generate_markov",
        template: &[
            Interpreter,
            L("scripts/process6/generate_markov.py"),
            L("--ngram"),
            L("2"),
            L("--length"),
            L("200"),
            L("--alltext"),
            L("ALL_TEXT.txt"),
            Seed,
            L("--out"),
            L("Output/run_all/step6_markov2.txt"),
        ],
        supports_gui: false,
        output_dir: Some(RUN_ARTIFACT_DIR),
    },
];

pub fn lookup(id: StepId) -> Option<&'static Step> {
    REGISTRY.iter().find(|step| step.id == id)
}

/// Comma-separated ids of every registry step, for help and error text.
pub fn known_ids() -> String {
    REGISTRY
        .iter()
        .map(|step| step.id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
