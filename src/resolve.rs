//! Expansion of step templates into concrete command lines.
//!
//! Resolution is pure: the dry-run renderer and the executor call the same
//! function with the same context, so what is printed is what would run.
use crate::context::RunContext;
use crate::registry::{Step, StepId, TemplateArg};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCommand {
    pub step_id: StepId,
    pub program: String,
    pub args: Vec<String>,
}

impl ResolvedCommand {
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    #[cfg(test)]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|candidate| candidate == arg)
    }
}

/// Shell-quoted form shared by the dry-run output and the run log.
impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.argv()))
    }
}

pub fn resolve_command(step: &Step, ctx: &RunContext) -> ResolvedCommand {
    let mut argv: Vec<String> = Vec::with_capacity(step.template.len() + 2);
    for arg in step.template {
        match arg {
            TemplateArg::Interpreter => argv.extend(ctx.interpreter.iter().cloned()),
            TemplateArg::Literal(text) => argv.push((*text).to_string()),
            TemplateArg::Top => {
                argv.push("--top".to_string());
                argv.push(ctx.top.to_string());
            }
            TemplateArg::Overwrite => {
                if ctx.overwrite {
                    argv.push("--overwrite".to_string());
                }
            }
            TemplateArg::Gui => {
                if ctx.gui_enabled_for(step) {
                    argv.push("--gui".to_string());
                }
            }
            TemplateArg::Seed => {
                if let Some(seed) = ctx.seed {
                    argv.push("--seed".to_string());
                    argv.push(seed.to_string());
                }
            }
        }
    }

    let mut argv = argv.into_iter();
    // Interpreter resolution guarantees at least one token.
    let program = argv.next().unwrap_or_default();
    ResolvedCommand {
        step_id: step.id,
        program,
        args: argv.collect(),
    }
}
