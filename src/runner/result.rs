//! Aggregate outcome of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::task::{ExecutionRecord, TaskStatus};

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No task failed.
    Succeeded,
    /// At least one task failed; every rollback attempted succeeded or was
    /// unsupported.
    Failed,
    /// A rollback itself failed.
    PartialFailure,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    /// Derive the run status from the final records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ExecutionRecord>) -> Self {
        let mut status = RunStatus::Succeeded;
        for record in records {
            if record.rollback_error.is_some() {
                return RunStatus::PartialFailure;
            }
            if record.status.is_failure() {
                status = RunStatus::Failed;
            }
        }
        status
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::PartialFailure => "partial failure",
        };
        write!(f, "{}", s)
    }
}

/// Result of running a task set.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    /// The batches computed for the run, in processing order.
    pub batches: Vec<Vec<String>>,
    /// Final record per active task.
    pub records: BTreeMap<String, ExecutionRecord>,
    pub duration: Duration,
}

impl RunResult {
    /// Get the record for a task.
    pub fn record(&self, task_id: &str) -> Option<&ExecutionRecord> {
        self.records.get(task_id)
    }

    /// Status of a task, if it took part in the run.
    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.record(task_id).map(|r| r.status)
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.with_status(|s| s == TaskStatus::Succeeded)
    }

    /// Tasks that failed, rolled back or not.
    pub fn failed(&self) -> Vec<&str> {
        self.with_status(|s| s.is_failure())
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.with_status(|s| s == TaskStatus::Skipped)
    }

    fn with_status(&self, predicate: impl Fn(TaskStatus) -> bool) -> Vec<&str> {
        self.records
            .values()
            .filter(|r| predicate(r.status))
            .map(|r| r.task_id.as_str())
            .collect()
    }
}
