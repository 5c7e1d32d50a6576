//! Execution records: the per-task outcome of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

use super::model::Task;
use super::status::TaskStatus;

/// Output variables produced by a processor, keyed by output name.
pub type Outputs = BTreeMap<String, Value>;

/// Category of a per-task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The spec referenced a task outside the declared dependencies.
    UndeclaredDependencyReference,

    /// A referenced output does not exist.
    UnresolvedReference,

    /// The processor does not implement the requested action.
    UnsupportedCommand,

    /// The processor reported an error.
    ProcessorError,

    /// Rollback after a failure also failed.
    RollbackError,

    /// A hook blocked execution.
    Blocked,
}

impl FailureKind {
    /// Whether this failure came from variable resolution.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            FailureKind::UndeclaredDependencyReference | FailureKind::UnresolvedReference
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UndeclaredDependencyReference => "undeclared dependency reference",
            FailureKind::UnresolvedReference => "unresolved reference",
            FailureKind::UnsupportedCommand => "unsupported command",
            FailureKind::ProcessorError => "processor error",
            FailureKind::RollbackError => "rollback error",
            FailureKind::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

/// A failure recorded against a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn processor(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ProcessorError, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Blocked, message)
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A labelled point in a task's processing timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingEvent {
    /// Event label, e.g. `CREATE_ACTION_START`.
    pub label: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,

    pub at: DateTime<Utc>,
}

/// The last state a mutating action successfully applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedState {
    #[serde(default)]
    pub outputs: Outputs,

    /// Checksum of the resolved spec that was applied.
    pub spec_checksum: String,

    pub applied_at: DateTime<Utc>,
}

/// Outcome of a single task in a run.
///
/// Only the execution controller mutates records. They are persisted at
/// every status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: String,

    pub task_type: String,

    /// The run command, e.g. `create`.
    pub command: String,

    pub context: String,

    pub status: TaskStatus,

    /// Outputs produced in this run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: Outputs,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<TaskFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Last successfully applied state, carried across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<AppliedState>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ProcessingEvent>,
}

impl ExecutionRecord {
    /// Create a pending record for a task entering the processing order.
    pub fn pending(task: &Task, command: &str, context: &str) -> Self {
        Self {
            task_id: task.id().to_string(),
            task_type: task.task_type().to_string(),
            command: command.to_string(),
            context: context.to_string(),
            status: TaskStatus::Pending,
            outputs: Outputs::new(),
            error: None,
            rollback_error: None,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            applied: None,
            events: Vec::new(),
        }
    }

    /// Carry the applied state of a prior record forward.
    pub fn carrying(mut self, prior: Option<&ExecutionRecord>) -> Self {
        self.applied = prior.and_then(|p| p.applied.clone());
        self
    }

    /// Move to `next`, returning `false` if the transition is not allowed.
    ///
    /// Entering `Resolving` stamps the start time; entering a terminal
    /// status stamps the finish time and duration.
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        if next == TaskStatus::Resolving {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
            if let Some(started) = self.started_at {
                self.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
            }
        }
        self.status = next;
        true
    }

    /// Append a processing event.
    pub fn push_event(&mut self, label: impl Into<String>, detail: impl Into<String>) {
        self.events.push(ProcessingEvent {
            label: label.into(),
            detail: detail.into(),
            at: Utc::now(),
        });
    }

    /// Outputs other runs may reference: those of the last applied state.
    ///
    /// A deleted task, or one that was only described, has nothing to offer.
    pub fn referenceable_outputs(&self) -> Option<&Outputs> {
        self.applied.as_ref().map(|a| &a.outputs)
    }

    /// One-line summary for terminal output.
    pub fn summary_line(&self) -> String {
        let mut line = format!("{} {}", self.status.display_char(), self.task_id);
        if let Some(ms) = self.duration_ms {
            line.push_str(&format!(" ({})", format_duration_ms(ms)));
        }
        if let Some(err) = &self.error {
            line.push_str(&format!(" - {}", err));
        }
        if let Some(err) = &self.rollback_error {
            line.push_str(&format!(" [{}]", err));
        }
        line
    }
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}
