//! Terminal styling for command output.

use console::Style;

use crate::runner::RunStatus;
use crate::task::TaskStatus;

/// Styles used by the CLI.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warning messages (yellow).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for headers (bold).
    pub header: Style,
    /// Style for secondary text.
    pub dim: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::new()
    }
}

impl Theme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            header: Style::new().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Style for a task status.
    pub fn status(&self, status: TaskStatus) -> &Style {
        match status {
            TaskStatus::Succeeded => &self.success,
            TaskStatus::Failed => &self.error,
            TaskStatus::RolledBack | TaskStatus::Skipped => &self.warning,
            TaskStatus::Pending | TaskStatus::Resolving | TaskStatus::Running => &self.dim,
        }
    }

    /// Style for an overall run status.
    pub fn run_status(&self, status: RunStatus) -> &Style {
        match status {
            RunStatus::Succeeded => &self.success,
            RunStatus::Failed => &self.error,
            RunStatus::PartialFailure => &self.warning,
        }
    }
}
