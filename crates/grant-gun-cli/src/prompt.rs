use crate::show::{self, Palette, Wording};
use anyhow::{Context, Result, bail};
use grant_gun::approval::{Command, OperatorPrompt, SkipReason, Verdict};
use grant_gun::reconcile::Candidate;
use std::io::{BufRead, Write};
use tracing::warn;

/// Asks the operator line by line, e.g. on stdin/stdout.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
    palette: Palette,
    wording: Wording,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W, palette: Palette, wording: Wording) -> Self {
        LinePrompt {
            input,
            output,
            palette,
            wording,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn read_command(&mut self) -> Result<Command> {
        loop {
            let bold = self.palette.bold();
            write!(
                self.output,
                "{bold}Approve this {}? (y/n/a/q/?):{bold:#} ",
                self.wording.noun
            )?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("Failed to read operator input")?;
            if read == 0 {
                bail!("Input closed before every {} was reviewed", self.wording.noun);
            }

            match line.parse::<Command>() {
                Ok(command) => return Ok(command),
                Err(invalid) => {
                    let failure = self.palette.failure();
                    writeln!(self.output, "{failure}{invalid}{failure:#}")?;
                }
            }
        }
    }

    fn notify(&mut self, result: std::io::Result<()>) {
        if let Err(error) = result {
            warn!("Failed to write to the terminal: {error}");
        }
    }
}

impl<R: BufRead, W: Write> OperatorPrompt for LinePrompt<R, W> {
    fn ask(&mut self, candidate: &Candidate, position: usize, total: usize) -> Result<Command> {
        show::candidate(
            &mut self.output,
            &self.palette,
            &self.wording,
            candidate,
            position,
            total,
        )?;
        self.read_command()
    }

    fn show_help(&mut self) {
        let result = show::help(&mut self.output, &self.palette, &self.wording);
        self.notify(result);
    }

    fn decided(&mut self, candidate: &Candidate, verdict: Verdict) {
        let result = show::decided(&mut self.output, &self.palette, candidate, verdict);
        self.notify(result);
    }

    fn skipped(&mut self, candidate: &Candidate, position: usize, total: usize, reason: SkipReason) {
        let result = show::skipped(
            &mut self.output,
            &self.palette,
            candidate,
            position,
            total,
            reason,
        );
        self.notify(result);
    }
}
