//! Operarius - Dependency-ordered task processing.
//!
//! Operarius runs a set of tasks in dependency order. Each task has a type
//! handled by a registered [`TaskProcessor`](processor::TaskProcessor), a
//! spec that may reference outputs of the tasks it depends on with
//! `${VAR:task:key}`, and an execution record that is persisted at every
//! status transition.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Manifest loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`hooks`] - Middleware around processor calls
//! - [`logging`] - Run events and the loggers that record them
//! - [`processor`] - The processor interface, registry and built-ins
//! - [`runner`] - Dependency graph, batching and the workflow runner
//! - [`state`] - Execution record persistence
//! - [`task`] - Tasks, statuses and execution records
//! - [`variables`] - Output references and their resolution
//!
//! # Example
//!
//! ```
//! use operarius::processor::{PassthroughProcessor, ProcessorRegistry};
//! use operarius::runner::{RunOptions, RunStatus, WorkflowRunner};
//! use operarius::task::{Task, TaskSet};
//! use serde_yaml::Value;
//!
//! let network: Value = serde_yaml::from_str("cidr: 10.0.0.0/16").unwrap();
//! let subnet: Value = serde_yaml::from_str("parent: '${VAR:network:cidr}'").unwrap();
//! let tasks = TaskSet::from_tasks([
//!     Task::new("network", "passthrough", network),
//!     Task::new("subnet", "passthrough", subnet).depends_on(["network"]),
//! ])
//! .unwrap();
//!
//! let runner = WorkflowRunner::new(
//!     ProcessorRegistry::new().with("passthrough", PassthroughProcessor),
//! );
//! let result = runner.run(&tasks, &RunOptions::new("create")).unwrap();
//!
//! assert_eq!(result.status, RunStatus::Succeeded);
//! let subnet = result.record("subnet").unwrap();
//! assert_eq!(subnet.outputs["parent"], Value::from("10.0.0.0/16"));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod processor;
pub mod runner;
pub mod state;
pub mod task;
pub mod variables;

pub use error::{OperariusError, Result};
