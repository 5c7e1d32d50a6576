//! Run event logging.
//!
//! The controller and the hooks report what happens during a run through a
//! [`RunLogger`] passed in the run options, never through a global. The
//! default [`TracingLogger`] forwards events to `tracing`.

use std::time::Duration;

use crate::processor::Action;
use crate::runner::RunStatus;
use crate::task::{ExecutionRecord, TaskFailure, TaskStatus};

/// Structured events emitted during a run.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// Validation passed and processing is about to begin.
    RunStarted {
        command: &'a str,
        context: &'a str,
        tasks: usize,
        batches: usize,
    },
    /// A batch is about to run.
    BatchStarted {
        index: usize,
        total: usize,
        tasks: &'a [String],
    },
    /// A task changed status.
    TaskTransition {
        from: TaskStatus,
        record: &'a ExecutionRecord,
    },
    /// A hook is about to hand the task to its processor.
    Dispatch { task: &'a str, action: Action },
    /// The processor call for a task returned.
    DispatchFinished {
        task: &'a str,
        action: Action,
        error: Option<&'a str>,
    },
    /// A hook ended the chain without reaching the processor.
    HookShortCircuit {
        task: &'a str,
        hook: &'a str,
        reason: &'a str,
    },
    /// Rollback of a failed task is starting.
    RollbackStarted { task: &'a str },
    /// The processor cannot roll the task back; it stays failed.
    RollbackUnsupported { task: &'a str },
    /// Rollback of a failed task returned.
    RollbackFinished {
        task: &'a str,
        error: Option<&'a TaskFailure>,
    },
    /// Output keys a task produced that were already recorded.
    OutputsIgnored { task: &'a str, keys: &'a [String] },
    /// A record could not be persisted.
    StateSaveFailed { task: &'a str, error: &'a str },
    /// All batches are done.
    RunFinished {
        status: RunStatus,
        duration: Duration,
    },
}

/// Receives run events.
pub trait RunLogger: Send + Sync {
    fn log(&self, event: &RunEvent<'_>);
}

/// Forwards run events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RunLogger for TracingLogger {
    fn log(&self, event: &RunEvent<'_>) {
        match event {
            RunEvent::RunStarted {
                command,
                context,
                tasks,
                batches,
            } => {
                tracing::info!(command, context, tasks, batches, "run started");
            }
            RunEvent::BatchStarted {
                index,
                total,
                tasks,
            } => {
                tracing::info!(
                    batch = index + 1,
                    of = total,
                    tasks = %tasks.join(", "),
                    "batch started"
                );
            }
            RunEvent::TaskTransition { from, record } => {
                let task = record.task_id.as_str();
                let state = record.status;
                match (state, &record.error) {
                    (TaskStatus::Failed, Some(err)) => {
                        tracing::error!(task, %from, %state, error = %err, "task transitioned")
                    }
                    (TaskStatus::Skipped, Some(err)) => {
                        tracing::warn!(task, %from, %state, note = %err, "task transitioned")
                    }
                    _ if state.is_terminal() => {
                        tracing::info!(task, %from, %state, "task transitioned")
                    }
                    _ => tracing::debug!(task, %from, %state, "task transitioned"),
                }
            }
            RunEvent::Dispatch { task, action } => {
                tracing::debug!(task, %action, "dispatching to processor");
            }
            RunEvent::DispatchFinished {
                task,
                action,
                error,
            } => match error {
                Some(error) => tracing::warn!(task, %action, error, "processor failed"),
                None => tracing::debug!(task, %action, "processor finished"),
            },
            RunEvent::HookShortCircuit { task, hook, reason } => {
                tracing::info!(task, hook, reason, "hook short-circuited");
            }
            RunEvent::RollbackStarted { task } => {
                tracing::warn!(task, "rolling back");
            }
            RunEvent::RollbackUnsupported { task } => {
                tracing::warn!(task, "rollback not supported, leaving task failed");
            }
            RunEvent::RollbackFinished { task, error } => match error {
                Some(err) => tracing::error!(task, error = %err, "rollback failed"),
                None => tracing::info!(task, "rolled back"),
            },
            RunEvent::OutputsIgnored { task, keys } => {
                tracing::warn!(task, keys = %keys.join(", "), "outputs already recorded, ignoring");
            }
            RunEvent::StateSaveFailed { task, error } => {
                tracing::error!(task, error, "failed to persist record");
            }
            RunEvent::RunFinished { status, duration } => {
                let elapsed_ms = duration.as_millis() as u64;
                match status {
                    RunStatus::Succeeded => tracing::info!(%status, elapsed_ms, "run finished"),
                    _ => tracing::warn!(%status, elapsed_ms, "run finished"),
                }
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl RunLogger for NullLogger {
    fn log(&self, _event: &RunEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use serde_yaml::Value;

    #[test]
    fn loggers_accept_every_event() {
        let task = Task::new("a", "t", Value::Null);
        let mut record = ExecutionRecord::pending(&task, "create", "default");
        record.advance(TaskStatus::Resolving);
        record.advance(TaskStatus::Failed);
        record.error = Some(TaskFailure::processor("boom"));
        let ids = vec!["a".to_string()];

        let events = [
            RunEvent::RunStarted {
                command: "create",
                context: "default",
                tasks: 1,
                batches: 1,
            },
            RunEvent::BatchStarted {
                index: 0,
                total: 1,
                tasks: &ids,
            },
            RunEvent::TaskTransition {
                from: TaskStatus::Resolving,
                record: &record,
            },
            RunEvent::RollbackFinished {
                task: "a",
                error: record.error.as_ref(),
            },
            RunEvent::RunFinished {
                status: RunStatus::Failed,
                duration: Duration::from_millis(5),
            },
        ];

        for event in &events {
            TracingLogger.log(event);
            NullLogger.log(event);
        }
    }
}
