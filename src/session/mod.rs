pub mod render;

use crate::repair::{RepairLoop, RepairOutcome};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

pub const PROMPT_MARKER: &str = "askretro> ";

const EXIT_COMMANDS: &[&str] = &["quit", "exit"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub questions: usize,
    pub answered: usize,
}

/// Drives one repair cycle per question and writes the rendered outcome.
pub struct Session<W: Write> {
    repair: RepairLoop,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(repair: RepairLoop, out: W) -> Self {
        Self { repair, out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Runs one repair cycle and renders it. Returns whether the question was answered.
    pub async fn ask(&mut self, question: &str) -> io::Result<bool> {
        let outcome = self.repair.run(question).await;
        debug!(
            "Repair cycle finished after {} of {} attempt(s)",
            outcome.attempts().len(),
            self.repair.max_attempts()
        );
        let rendered = match &outcome {
            RepairOutcome::Succeeded(success) => render::render_success(success),
            RepairOutcome::Failed(failure) => render::render_failure(failure),
        };
        writeln!(self.out, "{}", rendered)?;
        self.out.flush()?;
        Ok(outcome.is_success())
    }

    pub async fn run_single(&mut self, question: &str) -> io::Result<bool> {
        writeln!(self.out, "Question: {}\n", question)?;
        self.ask(question).await
    }

    /// Reads questions until `quit`, `exit` or end of input.
    pub async fn run_interactive<R>(&mut self, input: R) -> io::Result<SessionStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut stats = SessionStats::default();

        loop {
            write!(self.out, "{}", PROMPT_MARKER)?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await? else {
                debug!("End of input");
                writeln!(self.out)?;
                break;
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if is_exit_command(question) {
                break;
            }

            stats.questions += 1;
            if self.ask(question).await? {
                stats.answered += 1;
            }
        }

        info!(
            "Session finished: {} question(s), {} answered",
            stats.questions, stats.answered
        );
        Ok(stats)
    }
}

fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|command| input.eq_ignore_ascii_case(command))
}
