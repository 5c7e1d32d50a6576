//! Per-task execution status.

use serde::{Deserialize, Serialize};

/// Status of a task within a run.
///
/// Tasks move `Pending -> Resolving -> Running -> Succeeded | Failed`.
/// A failed task may then be `RolledBack`. Tasks the run never reaches end
/// in `Skipped`. `Succeeded`, `Failed`, `RolledBack` and `Skipped` are
/// terminal: nothing moves a task out of them within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting for its batch.
    Pending,

    /// Variable references in the spec are being resolved.
    Resolving,

    /// The hook chain is running.
    Running,

    /// The processor call completed.
    Succeeded,

    /// Resolution or processing failed.
    Failed,

    /// The task failed and its rollback completed.
    RolledBack,

    /// The task was never processed in this run.
    Skipped,
}

impl TaskStatus {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::RolledBack | TaskStatus::Skipped
        )
    }

    /// Check whether moving from this status to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Resolving)
                | (Pending, Skipped)
                | (Resolving, Running)
                | (Resolving, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Skipped)
                | (Failed, RolledBack)
        )
    }

    /// Whether the status counts as a failure for the run outcome.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::RolledBack)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            TaskStatus::Pending => '○',
            TaskStatus::Resolving => '◌',
            TaskStatus::Running => '◉',
            TaskStatus::Succeeded => '✓',
            TaskStatus::Failed => '✗',
            TaskStatus::RolledBack => '↺',
            TaskStatus::Skipped => '⊘',
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Resolving => "resolving",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::RolledBack => "rolled back",
            TaskStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Resolving.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::RolledBack.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Resolving));
        assert!(TaskStatus::Resolving.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Succeeded));
    }

    #[test]
    fn failure_may_roll_back() {
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Resolving.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::RolledBack));
    }

    #[test]
    fn no_transition_leaves_succeeded_or_skipped() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Failed,
            TaskStatus::RolledBack,
        ] {
            assert!(!TaskStatus::Succeeded.can_transition_to(next));
            assert!(!TaskStatus::Skipped.can_transition_to(next));
            assert!(!TaskStatus::RolledBack.can_transition_to(next));
        }
    }

    #[test]
    fn pending_cannot_jump_to_running() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Succeeded));
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(TaskStatus::RolledBack.to_string(), "rolled back");
        assert_eq!(TaskStatus::Succeeded.to_string(), "succeeded");
    }

    #[test]
    fn serializes_snake_case() {
        let yaml = serde_yaml::to_string(&TaskStatus::RolledBack).unwrap();
        assert_eq!(yaml.trim(), "rolled_back");
    }
}
