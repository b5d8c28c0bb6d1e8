use crate::error::RunError;
use crate::resolve::ResolvedCommand;
use std::io::Write;

/// Prints resolved commands in place of executing them.
pub struct DryRunRenderer<W: Write> {
    out: W,
}

impl<W: Write> DryRunRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn render(&mut self, command: &ResolvedCommand) -> Result<(), RunError> {
        writeln!(self.out, "CMD: {command}")
            .and_then(|()| self.out.flush())
            .map_err(|err| RunError::io("<stdout>", err))
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StepId;

    #[test]
    fn renders_one_line_per_command() {
        let mut renderer = DryRunRenderer::new(Vec::new());
        for (id, script) in [(2, "a.py"), (5, "b.py")] {
            let command = ResolvedCommand {
                step_id: StepId::new(id),
                program: "python3".to_string(),
                args: vec![script.to_string(), "--out".to_string(), "x y.txt".to_string()],
            };
            renderer.render(&command).expect("render");
        }
        let out = String::from_utf8(renderer.into_inner()).expect("utf8");
        assert_eq!(
            out,
            "CMD: python3 a.py --out 'x y.txt'\nCMD: python3 b.py --out 'x y.txt'\n"
        );
    }
}
