//! A processor that runs shell commands.
//!
//! Each action is a command line in the task spec:
//!
//! ```yaml
//! type: shell
//! spec:
//!   create: "mkdir -p /srv/data && echo /srv/data"
//!   delete: "rm -rf /srv/data"
//!   drift: "test -d /srv/data"
//!   env:
//!     RUST_LOG: info
//!   cwd: /srv
//! ```
//!
//! Actions without a command line are unsupported. Commands see
//! `OPERARIUS_TASK_ID` and `OPERARIUS_ACTION` in their environment.

use anyhow::Context as _;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::{Action, ProcessorError, ProcessorResult, TaskProcessor};
use crate::task::{ExecutionRecord, Outputs, Task};

/// Per-task shell configuration, read from the resolved spec.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShellSpec {
    create: Option<String>,
    update: Option<String>,
    delete: Option<String>,
    describe: Option<String>,
    drift: Option<String>,
    rollback: Option<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ShellSpec {
    fn parse(spec: &Value) -> ProcessorResult<Self> {
        if spec.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(spec.clone())
            .map_err(|e| ProcessorError::failed(format!("invalid shell spec: {}", e)))
    }

    fn command_for(&self, action: Action) -> Option<&str> {
        match action {
            Action::Create => self.create.as_deref(),
            Action::Update => self.update.as_deref(),
            Action::Delete => self.delete.as_deref(),
            Action::Describe => self.describe.as_deref(),
            Action::DetectDrift => self.drift.as_deref(),
            Action::Rollback => self.rollback.as_deref(),
        }
    }
}

/// Result of one command.
#[derive(Debug)]
struct ShellOutput {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl ShellOutput {
    fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn into_outputs(self) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.insert("stdout".into(), Value::from(self.stdout.trim().to_string()));
        outputs.insert("stderr".into(), Value::from(self.stderr));
        outputs.insert(
            "exit_code".into(),
            self.exit_code.map(Value::from).unwrap_or(Value::Null),
        );
        outputs
    }
}

/// Runs the spec's command line for each action.
#[derive(Debug, Clone, Default)]
pub struct ShellProcessor {
    default_cwd: Option<PathBuf>,
}

impl ShellProcessor {
    pub const TYPE: &'static str = "shell";

    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for tasks whose spec sets no `cwd`.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.default_cwd = Some(cwd.into());
        self
    }

    fn run(&self, task: &Task, spec: &Value, action: Action) -> ProcessorResult<ShellOutput> {
        let shell_spec = ShellSpec::parse(spec)?;
        let command = shell_spec
            .command_for(action)
            .ok_or(ProcessorError::unsupported(action))?;

        let (shell, flag) = shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag).arg(command);

        if let Some(cwd) = shell_spec.cwd.as_ref().or(self.default_cwd.as_ref()) {
            cmd.current_dir(cwd);
        }
        cmd.env("OPERARIUS_TASK_ID", task.id());
        cmd.env("OPERARIUS_ACTION", action.name());
        for (key, value) in &shell_spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());

        tracing::debug!("[{}] {}: {}", task.id(), action, command);
        let output = cmd
            .output()
            .with_context(|| format!("failed to spawn `{}`", command))?;

        Ok(ShellOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run an action whose non-zero exit is a failure.
    fn run_checked(&self, task: &Task, spec: &Value, action: Action) -> ProcessorResult<Outputs> {
        let output = self.run(task, spec, action)?;
        if output.success() {
            return Ok(output.into_outputs());
        }

        let message = match output.exit_code {
            Some(code) => format!("{} command exited with code {}", action, code),
            None => format!("{} command was terminated by a signal", action),
        };
        let detail = output.stderr.trim().to_string();
        let message = if detail.is_empty() {
            message
        } else {
            format!("{}: {}", message, detail)
        };
        Err(ProcessorError::with_partial(message, output.into_outputs()))
    }
}

fn shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd.exe", "/C")
    } else {
        ("/bin/sh", "-c")
    }
}

impl TaskProcessor for ShellProcessor {
    fn create(&self, task: &Task, spec: &Value) -> ProcessorResult<Outputs> {
        self.run_checked(task, spec, Action::Create)
    }

    fn update(
        &self,
        task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        self.run_checked(task, spec, Action::Update)
    }

    fn delete(
        &self,
        task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<()> {
        self.run_checked(task, spec, Action::Delete).map(|_| ())
    }

    fn describe(
        &self,
        task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        self.run_checked(task, spec, Action::Describe)
    }

    /// Drift is reported when the drift command exits non-zero.
    fn drift(
        &self,
        task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<bool> {
        let output = self.run(task, spec, Action::DetectDrift)?;
        if output.exit_code.is_none() {
            return Err(ProcessorError::failed(
                "drift command was terminated by a signal",
            ));
        }
        Ok(!output.success())
    }

    fn rollback(
        &self,
        task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
        _partial: &Outputs,
    ) -> ProcessorResult<()> {
        self.run_checked(task, spec, Action::Rollback).map(|_| ())
    }
}
