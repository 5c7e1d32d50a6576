//! Manifest schema definitions.
//!
//! This module defines the structure of a manifest file. A manifest
//! declares the run settings, extra command links and the tasks:
//!
//! ```yaml
//! settings:
//!   workers: 4
//!   rollback: failed-task
//!   on_failure: skip-dependents
//!   state_file: .operarius/state.yml
//! commands:
//!   apply: create
//! tasks:
//!   - id: bucket
//!     type: passthrough
//!     spec:
//!       name: assets
//!     labels:
//!       tier: storage
//!   - id: site
//!     type: passthrough
//!     depends_on: [bucket]
//!     depends_on_labels:
//!       - {key: tier, value: storage}
//!     spec:
//!       origin: ${VAR:bucket:name}
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{OperariusError, Result};
use crate::hooks::{ContextGuard, HookChain, LoggingHook, UnchangedSpecGuard};
use crate::processor::{Action, CommandTable};
use crate::runner::{OnFailure, RollbackPolicy, RunOptions};
use crate::task::{ConditionalDependency, LabelSelector, ProcessingScope, Task, TaskSet};

/// Root manifest structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Run settings.
    pub settings: Settings,

    /// Extra command links: command name -> action name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,

    /// Declared tasks.
    pub tasks: Vec<TaskConfig>,
}

impl Manifest {
    /// Build the task set, failing on duplicate ids.
    pub fn into_tasks(self) -> Result<TaskSet> {
        TaskSet::from_tasks(self.tasks.into_iter().map(TaskConfig::into_task))
    }

    /// The built-in command table extended with this manifest's links.
    pub fn command_table(&self) -> Result<CommandTable> {
        let mut table = CommandTable::default();
        for (command, action_name) in &self.commands {
            let action = Action::from_name(action_name).ok_or_else(|| {
                OperariusError::ConfigValidationError {
                    message: format!(
                        "Command '{}' is linked to unknown action '{}'",
                        command, action_name
                    ),
                }
            })?;
            table.link(command.clone(), action);
        }
        Ok(table)
    }
}

/// Global run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker threads per batch.
    pub workers: usize,

    /// Which tasks are rolled back after a failure.
    pub rollback: RollbackPolicy,

    /// Whether later batches run after a failure.
    pub on_failure: OnFailure,

    /// Where execution records are kept between runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Contexts in which tasks marked `protected: true` are blocked.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protected_contexts: Vec<String>,

    /// Skip updates whose spec matches the last applied one.
    pub skip_unchanged: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 1,
            rollback: RollbackPolicy::default(),
            on_failure: OnFailure::default(),
            state_file: None,
            protected_contexts: Vec::new(),
            skip_unchanged: false,
        }
    }
}

impl Settings {
    /// Run options for `command` in `context` using these settings.
    pub fn run_options(&self, command: &str, context: &str) -> RunOptions {
        RunOptions::new(command)
            .in_context(context)
            .with_workers(self.workers)
            .with_rollback(self.rollback)
            .with_on_failure(self.on_failure)
    }

    /// The hook chain these settings ask for.
    pub fn hook_chain(&self) -> HookChain {
        let mut chain = HookChain::new();
        if !self.protected_contexts.is_empty() {
            chain.push(ContextGuard::new(self.protected_contexts.iter().cloned()));
        }
        if self.skip_unchanged {
            chain.push(UnchangedSpecGuard);
        }
        chain.push(LoggingHook);
        chain
    }
}

/// A task as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Task id. Derived from the spec checksum when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Processor type.
    #[serde(rename = "type")]
    pub task_type: String,

    /// Only active in this context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Key/value labels other tasks can select on.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Depend on every active task carrying a matching label.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on_labels: Vec<LabelSelector>,

    /// Dependencies that apply only to some commands or contexts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ConditionalDependency>,

    /// Commands and contexts the task takes part in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ProcessingScope>,

    /// Overrides the run's rollback policy for this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rollback: Option<bool>,

    /// Processor-specific payload.
    pub spec: Value,
}

impl TaskConfig {
    /// Build the task this entry declares.
    pub fn into_task(self) -> Task {
        let mut task = match self.id {
            Some(id) => Task::new(id, self.task_type, self.spec),
            None => Task::with_derived_id(self.task_type, self.spec),
        };
        task = task.depends_on(self.depends_on);
        for (key, value) in self.labels {
            task = task.with_label(key, value);
        }
        for selector in self.depends_on_labels {
            task = task.depends_on_label(selector);
        }
        for dependency in self.dependencies {
            task = task.with_conditional_dependency(dependency);
        }
        for scope in self.scopes {
            task = task.with_scope(scope);
        }
        if let Some(context) = self.context {
            task = task.in_context(context);
        }
        if let Some(enabled) = self.auto_rollback {
            task = task.with_auto_rollback(enabled);
        }
        task
    }
}
