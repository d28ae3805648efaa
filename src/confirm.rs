//! The single confirmation gate between the dry-run and apply passes.
use crate::orchestrator::PassSummary;
use std::io::{self, BufRead, Write};

/// Decides whether a previewed batch should be applied.
pub trait Confirm {
    fn confirm(&mut self, preview: &PassSummary) -> io::Result<bool>;
}

/// Fixed answer, used for `--yes` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub bool);

impl Confirm for Fixed {
    fn confirm(&mut self, _preview: &PassSummary) -> io::Result<bool> {
        Ok(self.0)
    }
}

/// Interactive `y/N` prompt.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, _preview: &PassSummary) -> io::Result<bool> {
        write!(self.output, "\nProceed with standardization? (y/N): ")?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

/// Only `y` (any case, surrounding whitespace ignored) proceeds.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
