//! State command implementation.
//!
//! The `operarius state` command lists the records in a state file, or
//! prints one task's full record.

use std::io::Write;

use crate::cli::args::StateArgs;
use crate::cli::theme::Theme;
use crate::error::{OperariusError, Result};
use crate::state::FileStateStore;

use super::dispatcher::{Command, CommandResult};

/// The state command implementation.
pub struct StateCommand {
    args: StateArgs,
    theme: Theme,
}

impl StateCommand {
    /// Create a new state command.
    pub fn new(args: StateArgs, theme: Theme) -> Self {
        Self { args, theme }
    }
}

impl Command for StateCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let store = FileStateStore::open(&self.args.file)?;
        let records = store.records();

        if let Some(task) = &self.args.task {
            let Some(record) = records.get(task) else {
                writeln!(
                    out,
                    "{} No record for task '{}' in {}",
                    self.theme.error.apply_to("✗"),
                    task,
                    store.path().display()
                )?;
                return Ok(CommandResult::failure(1));
            };
            let yaml = serde_yaml::to_string(record)
                .map_err(|e| OperariusError::Other(anyhow::anyhow!(e)))?;
            write!(out, "{}", yaml)?;
            return Ok(CommandResult::success());
        }

        if records.is_empty() {
            writeln!(out, "{}", self.theme.dim.apply_to("No records"))?;
            return Ok(CommandResult::success());
        }

        for record in records.values() {
            writeln!(
                out,
                "{} {}",
                self.theme
                    .status(record.status)
                    .apply_to(record.summary_line()),
                self.theme
                    .dim
                    .apply_to(format!("{} @ {}", record.command, record.context))
            )?;
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatePersistence;
    use crate::task::{ExecutionRecord, Task, TaskStatus};
    use serde_yaml::Value;
    use std::path::Path;
    use tempfile::TempDir;

    fn seed(path: &Path) {
        let store = FileStateStore::open(path).unwrap();
        let task = Task::new("db", "passthrough", Value::Null);
        let mut record = ExecutionRecord::pending(&task, "create", "staging");
        record.advance(TaskStatus::Resolving);
        record.advance(TaskStatus::Running);
        record.advance(TaskStatus::Succeeded);
        store.save("db", &record).unwrap();
    }

    fn run(file: &Path, task: Option<&str>) -> (CommandResult, String) {
        let args = StateArgs {
            file: file.to_path_buf(),
            task: task.map(String::from),
        };
        let mut out = Vec::new();
        let result = StateCommand::new(args, Theme::new())
            .execute(&mut out)
            .unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn lists_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        seed(&path);

        let (result, output) = run(&path, None);
        assert!(result.success);
        assert!(output.contains("db"));
        assert!(output.contains("create @ staging"));
    }

    #[test]
    fn shows_one_record_as_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        seed(&path);

        let (result, output) = run(&path, Some("db"));
        assert!(result.success);
        assert!(output.contains("task_id: db"));
        assert!(output.contains("status: succeeded"));
    }

    #[test]
    fn unknown_task_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        seed(&path);

        let (result, output) = run(&path, Some("nope"));
        assert_eq!(result.exit_code, 1);
        assert!(output.contains("No record for task 'nope'"));
    }

    #[test]
    fn missing_file_has_no_records() {
        let temp = TempDir::new().unwrap();
        let (result, output) = run(&temp.path().join("absent.yml"), None);
        assert!(result.success);
        assert!(output.contains("No records"));
    }
}
