//! Pluggable task processors.
//!
//! A [`TaskProcessor`] implements what a task type actually does. Every
//! capability has a default implementation returning
//! [`ProcessorError::Unsupported`], so a processor only implements the
//! actions it supports.
//!
//! - [`Action`] / [`CommandTable`] - Map run commands to capabilities
//! - [`ProcessorRegistry`] - Task type to processor lookup
//! - [`PassthroughProcessor`] / [`ShellProcessor`] - Built-in processors
//!
//! # Example
//!
//! ```
//! use operarius::processor::{ProcessorResult, TaskProcessor};
//! use operarius::task::{Outputs, Task};
//! use serde_yaml::Value;
//!
//! struct Echo;
//!
//! impl TaskProcessor for Echo {
//!     fn create(&self, task: &Task, _spec: &Value) -> ProcessorResult<Outputs> {
//!         let mut outputs = Outputs::new();
//!         outputs.insert("id".into(), task.id().into());
//!         Ok(outputs)
//!     }
//! }
//! ```

pub mod action;
pub mod passthrough;
pub mod registry;
pub mod shell;

pub use action::{Action, CommandTable};
pub use passthrough::PassthroughProcessor;
pub use registry::ProcessorRegistry;
pub use shell::ShellProcessor;

use serde_yaml::Value;
use thiserror::Error;

use crate::task::{ExecutionRecord, FailureKind, Outputs, Task, TaskFailure};

/// Error returned by a processor capability.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor does not implement the action.
    #[error("action '{action}' is not supported by this processor")]
    Unsupported { action: Action },

    /// The action failed, possibly after producing some outputs.
    #[error("{message}")]
    Failed { message: String, partial: Outputs },

    /// Unexpected error from processor internals.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcessorError {
    pub fn unsupported(action: Action) -> Self {
        Self::Unsupported { action }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            partial: Outputs::new(),
        }
    }

    /// A failure that already produced some outputs.
    pub fn with_partial(message: impl Into<String>, partial: Outputs) -> Self {
        Self::Failed {
            message: message.into(),
            partial,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Outputs produced before the failure.
    pub fn partial_outputs(&self) -> Option<&Outputs> {
        match self {
            Self::Failed { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }

    /// Convert into the failure recorded on the task.
    pub fn to_failure(&self) -> TaskFailure {
        match self {
            Self::Unsupported { .. } => {
                TaskFailure::new(FailureKind::UnsupportedCommand, self.to_string())
            }
            Self::Other(err) => TaskFailure::processor(format!("{:#}", err)),
            Self::Failed { .. } => TaskFailure::processor(self.to_string()),
        }
    }
}

/// Result type for processor capabilities.
pub type ProcessorResult<T> = std::result::Result<T, ProcessorError>;

/// Output key carrying the result of a drift check.
pub const DRIFT_OUTPUT: &str = "drifted";

/// The capability set for one task type.
///
/// `spec` is always the fully resolved spec. `prior` is the task's
/// persisted record from earlier runs, or `None` when nothing was saved;
/// each processor decides how to treat a missing prior state.
pub trait TaskProcessor: Send + Sync {
    fn create(&self, task: &Task, spec: &Value) -> ProcessorResult<Outputs> {
        let _ = (task, spec);
        Err(ProcessorError::unsupported(Action::Create))
    }

    fn update(
        &self,
        task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        let _ = (task, spec, prior);
        Err(ProcessorError::unsupported(Action::Update))
    }

    fn delete(
        &self,
        task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<()> {
        let _ = (task, spec, prior);
        Err(ProcessorError::unsupported(Action::Delete))
    }

    /// Snapshot of the deployed state.
    fn describe(
        &self,
        task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        let _ = (task, spec, prior);
        Err(ProcessorError::unsupported(Action::Describe))
    }

    /// Whether the deployed state diverges from `spec`.
    fn drift(
        &self,
        task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<bool> {
        let _ = (task, spec, prior);
        Err(ProcessorError::unsupported(Action::DetectDrift))
    }

    /// Undo the effects of a failed action. `partial` holds any outputs
    /// the failed action produced.
    fn rollback(
        &self,
        task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
        partial: &Outputs,
    ) -> ProcessorResult<()> {
        let _ = (task, spec, prior, partial);
        Err(ProcessorError::unsupported(Action::Rollback))
    }
}

/// Call the capability matching `action` and normalise its result to outputs.
///
/// `delete` and `rollback` produce no outputs; `drift` produces a single
/// boolean under [`DRIFT_OUTPUT`].
pub fn invoke(
    processor: &dyn TaskProcessor,
    action: Action,
    task: &Task,
    spec: &Value,
    prior: Option<&ExecutionRecord>,
) -> ProcessorResult<Outputs> {
    match action {
        Action::Create => processor.create(task, spec),
        Action::Update => processor.update(task, spec, prior),
        Action::Delete => processor.delete(task, spec, prior).map(|()| Outputs::new()),
        Action::Describe => processor.describe(task, spec, prior),
        Action::DetectDrift => processor.drift(task, spec, prior).map(|drifted| {
            let mut outputs = Outputs::new();
            outputs.insert(DRIFT_OUTPUT.to_string(), Value::Bool(drifted));
            outputs
        }),
        Action::Rollback => processor
            .rollback(task, spec, prior, &Outputs::new())
            .map(|()| Outputs::new()),
    }
}
