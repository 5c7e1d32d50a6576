//! Error types for Operarius operations.
//!
//! This module defines [`OperariusError`], the error type for everything
//! that aborts a run before any task executes, and a [`Result`] type alias.
//!
//! # Error Handling Strategy
//!
//! - Graph and configuration problems are `OperariusError`s and abort the run
//! - Per-task problems never surface here; they are recorded as a
//!   [`TaskFailure`](crate::task::TaskFailure) on the task's execution record
//! - Use `anyhow::Error` (via `OperariusError::Other`) for unexpected errors

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::state::StateError;

/// A dependency edge whose target is not available to the run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MissingEdge {
    /// The task declaring the dependency.
    pub task: String,

    /// The dependency that could not be found.
    pub dependency: String,
}

impl fmt::Display for MissingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.task, self.dependency)
    }
}

/// Core error type for Operarius operations.
#[derive(Debug, Error)]
pub enum OperariusError {
    /// Manifest file not found at expected location.
    #[error("Manifest not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse manifest file.
    #[error("Failed to parse manifest at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid manifest structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Two tasks share the same id.
    #[error("Duplicate task id: {id}")]
    DuplicateTaskId { id: String },

    /// Tasks that can never reach zero in-degree.
    #[error("Circular dependency detected between tasks: {}", .tasks.join(", "))]
    CycleDetected { tasks: Vec<String> },

    /// Dependency edges whose targets are neither active nor persisted.
    #[error("Missing dependencies: {}", join_edges(.edges))]
    MissingDependency { edges: Vec<MissingEdge> },

    /// Task types with no registered processor.
    #[error("No processor registered for task type(s): {}", .types.join(", "))]
    MissingProcessor { types: Vec<String> },

    /// A command that is not linked to any action.
    #[error("Unknown command '{command}' (known: {})", .known.join(", "))]
    UnknownCommand { command: String, known: Vec<String> },

    /// State persistence failure outside of a task.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_edges(edges: &[MissingEdge]) -> String {
    edges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for Operarius operations.
pub type Result<T> = std::result::Result<T, OperariusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = OperariusError::ConfigNotFound {
            path: PathBuf::from("/foo/tasks.yml"),
        };
        assert!(err.to_string().contains("/foo/tasks.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = OperariusError::ConfigParseError {
            path: PathBuf::from("/tasks.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tasks.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn cycle_detected_lists_every_task() {
        let err = OperariusError::CycleDetected {
            tasks: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected between tasks: a, b, c"
        );
    }

    #[test]
    fn missing_dependency_lists_every_edge() {
        let err = OperariusError::MissingDependency {
            edges: vec![
                MissingEdge {
                    task: "app".into(),
                    dependency: "db".into(),
                },
                MissingEdge {
                    task: "web".into(),
                    dependency: "cache".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("app -> db"));
        assert!(msg.contains("web -> cache"));
    }

    #[test]
    fn missing_processor_lists_types() {
        let err = OperariusError::MissingProcessor {
            types: vec!["widget".into()],
        };
        assert!(err.to_string().contains("widget"));
    }

    #[test]
    fn unknown_command_lists_known_commands() {
        let err = OperariusError::UnknownCommand {
            command: "deploy".into(),
            known: vec!["create".into(), "delete".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("deploy"));
        assert!(msg.contains("create, delete"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: OperariusError = io_err.into();
        assert!(matches!(err, OperariusError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(OperariusError::ConfigValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
