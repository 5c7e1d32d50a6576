//! Run command implementation.
//!
//! The `operarius run` command executes a manifest and prints a summary
//! per batch.

use console::Term;
use std::io::Write;

use crate::cli::args::RunArgs;
use crate::cli::theme::Theme;
use crate::error::Result;
use crate::logging::{RunEvent, RunLogger, TracingLogger};
use crate::runner::RunResult;

use super::dispatcher::{Command, CommandResult};
use super::setup::LoadedManifest;

/// Forwards events to tracing and prints a line per finished task.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    theme: Theme,
}

impl ProgressLogger {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }
}

impl RunLogger for ProgressLogger {
    fn log(&self, event: &RunEvent<'_>) {
        TracingLogger.log(event);
        if let RunEvent::TaskTransition { record, .. } = event {
            if record.status.is_terminal() {
                let line = self
                    .theme
                    .status(record.status)
                    .apply_to(record.summary_line());
                // Progress is best effort; the summary is written to `out`
                let _ = Term::stderr().write_line(&line.to_string());
            }
        }
    }
}

/// The run command implementation.
pub struct RunCommand {
    args: RunArgs,
    theme: Theme,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(args: RunArgs, theme: Theme) -> Self {
        Self { args, theme }
    }

    fn write_summary(&self, out: &mut dyn Write, result: &RunResult) -> Result<()> {
        for (index, batch) in result.batches.iter().enumerate() {
            writeln!(
                out,
                "{}",
                self.theme.header.apply_to(format!("Batch {}", index + 1))
            )?;
            for record in batch.iter().filter_map(|id| result.record(id)) {
                writeln!(
                    out,
                    "  {}",
                    self.theme
                        .status(record.status)
                        .apply_to(record.summary_line())
                )?;
            }
        }

        let counts = format!(
            "{} succeeded, {} failed, {} skipped",
            result.succeeded().len(),
            result.failed().len(),
            result.skipped().len()
        );
        writeln!(
            out,
            "\nRun {} in {:.1}s ({})",
            self.theme
                .run_status(result.status)
                .apply_to(result.status.to_string()),
            result.duration.as_secs_f64(),
            counts
        )?;
        Ok(())
    }
}

impl Command for RunCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let loaded = LoadedManifest::load(&self.args.manifest)?;
        let runner = loaded.runner(self.args.state.as_deref())?;

        let mut options = loaded
            .settings
            .run_options(&self.args.command, &self.args.context)
            .with_logger(ProgressLogger::new(self.theme.clone()));
        if let Some(workers) = self.args.workers {
            options = options.with_workers(workers);
        }

        let result = runner.run(&loaded.tasks, &options)?;
        self.write_summary(out, &result)?;

        if result.status.is_success() {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(1))
        }
    }
}
