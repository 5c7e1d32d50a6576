//! Validate command implementation.
//!
//! The `operarius validate` command checks a manifest's rules, then plans
//! it to check the dependency graph and the registered task types.

use std::io::Write;

use crate::cli::args::ValidateArgs;
use crate::cli::theme::Theme;
use crate::config::{load_manifest, validate_config};
use crate::error::Result;

use super::dispatcher::{Command, CommandResult};
use super::setup::LoadedManifest;

/// The validate command implementation.
pub struct ValidateCommand {
    args: ValidateArgs,
    theme: Theme,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(args: ValidateArgs, theme: Theme) -> Self {
        Self { args, theme }
    }
}

impl Command for ValidateCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let manifest = load_manifest(&self.args.manifest)?;

        let errors = validate_config(&manifest);
        if !errors.is_empty() {
            for error in &errors {
                let location = error
                    .task
                    .as_ref()
                    .map(|t| format!(" {}:", t))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "{} [{}]{} {}",
                    self.theme.error.apply_to("✗"),
                    error.rule,
                    location,
                    error.message
                )?;
            }
            writeln!(out, "\n{} error(s) found", errors.len())?;
            return Ok(CommandResult::failure(1));
        }

        let loaded = LoadedManifest::load(&self.args.manifest)?;
        let options = loaded
            .settings
            .run_options(&self.args.command, &self.args.context);
        let planned = loaded
            .runner(None)
            .and_then(|runner| runner.plan(&loaded.tasks, &options));

        match planned {
            Ok(plan) => {
                writeln!(
                    out,
                    "{} {} task(s) in {} batch(es) for '{}' in '{}'",
                    self.theme.success.apply_to("✓"),
                    plan.task_count(),
                    plan.batches.len(),
                    options.command,
                    options.context
                )?;
                Ok(CommandResult::success())
            }
            Err(err) => {
                writeln!(out, "{} {}", self.theme.error.apply_to("✗"), err)?;
                Ok(CommandResult::failure(1))
            }
        }
    }
}
