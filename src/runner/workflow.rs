//! Workflow execution orchestration.
//!
//! [`WorkflowRunner::run`] validates a task set, orders it into batches and
//! drives every active task through resolution, the hook chain and its
//! processor. Per-task failures are recorded, never returned: once
//! validation passes, `run` always yields a full [`RunResult`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::error::Result;
use crate::hooks::{HookCall, HookChain, HookOutcome};
use crate::logging::{RunEvent, RunLogger, TracingLogger};
use crate::processor::{
    Action, CommandTable, ProcessorError, ProcessorRegistry, ProcessorResult, TaskProcessor,
};
use crate::state::{NoPersistence, StatePersistence};
use crate::task::{
    spec_checksum, AppliedState, Context, ExecutionRecord, FailureKind, Outputs, Task, TaskFailure,
    TaskSet, TaskStatus,
};
use crate::variables::{resolve_spec, ResolvedVariables};

use super::dependency::DependencyGraph;
use super::pool;
use super::result::{RunResult, RunStatus};

/// Which tasks are rolled back when an action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackPolicy {
    /// Roll back the task whose mutating action failed.
    #[default]
    FailedTask,
    /// Never roll back.
    None,
}

/// How the run continues after a task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFailure {
    /// Finish the current batch, then skip every remaining batch.
    #[default]
    Halt,
    /// Keep going, skipping only tasks that depend on a failed task.
    SkipDependents,
}

/// Options for a single run.
#[derive(Clone)]
pub struct RunOptions {
    /// The command to run, looked up in the command table.
    pub command: String,
    pub context: Context,
    /// Worker threads per batch. `1` runs tasks sequentially in id order.
    pub workers: usize,
    pub rollback: RollbackPolicy,
    pub on_failure: OnFailure,
    pub logger: Arc<dyn RunLogger>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            command: Action::Create.name().to_string(),
            context: Context::default(),
            workers: 1,
            rollback: RollbackPolicy::default(),
            on_failure: OnFailure::default(),
            logger: Arc::new(TracingLogger),
        }
    }
}

impl RunOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Context::new(context);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackPolicy) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_logger(mut self, logger: impl RunLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("command", &self.command)
            .field("context", &self.context)
            .field("workers", &self.workers)
            .field("rollback", &self.rollback)
            .field("on_failure", &self.on_failure)
            .finish_non_exhaustive()
    }
}

/// A validated run: the action, the batches and the prior state.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub action: Action,
    pub graph: DependencyGraph,
    pub batches: Vec<Vec<String>>,
    /// Persisted records of active tasks and their outside dependencies.
    pub prior: BTreeMap<String, ExecutionRecord>,
}

impl RunPlan {
    /// Number of tasks that will be processed.
    pub fn task_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Dependencies satisfied by persisted state rather than this run.
    pub fn external(&self) -> BTreeSet<&str> {
        self.graph.external_dependencies()
    }
}

/// Orchestrates runs over a task set.
#[derive(Clone)]
pub struct WorkflowRunner {
    registry: ProcessorRegistry,
    hooks: HookChain,
    commands: CommandTable,
    state: Arc<dyn StatePersistence>,
}

impl WorkflowRunner {
    /// Create a runner with no hooks, the built-in commands and no
    /// persisted state.
    pub fn new(registry: ProcessorRegistry) -> Self {
        Self {
            registry,
            hooks: HookChain::new(),
            commands: CommandTable::default(),
            state: Arc::new(NoPersistence),
        }
    }

    pub fn with_hooks(mut self, hooks: HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_state(mut self, state: Arc<dyn StatePersistence>) -> Self {
        self.state = state;
        self
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Validate a run without executing anything.
    ///
    /// Checks, in order: the command is linked, every active task type has
    /// a processor, every dependency is present or has prior state, and
    /// the graph is acyclic.
    pub fn plan(&self, tasks: &TaskSet, options: &RunOptions) -> Result<RunPlan> {
        let action = self.commands.action_for(&options.command)?;
        let active = tasks.active(&options.command, &options.context);
        self.registry
            .ensure_registered(active.iter().map(|t| t.task_type()))?;

        let active_ids: BTreeSet<&str> = active.iter().map(|t| t.id()).collect();
        let mut builder = DependencyGraph::builder();
        let mut outside = BTreeSet::new();
        for task in &active {
            let deps = tasks.run_dependencies(task, &options.command, &options.context);
            outside.extend(
                deps.iter()
                    .filter(|d| !active_ids.contains(d.as_str()))
                    .cloned(),
            );
            builder = builder.add_task(task.id(), deps);
        }

        let mut prior = BTreeMap::new();
        for id in active_ids.iter().copied().chain(outside.iter().map(String::as_str)) {
            if let Some(record) = self.load_prior(id)? {
                prior.insert(id.to_string(), record);
            }
        }

        let satisfied = outside.iter().filter(|id| {
            prior
                .get(id.as_str())
                .is_some_and(|r: &ExecutionRecord| r.referenceable_outputs().is_some())
        });
        let graph = builder.with_prior_state(satisfied).build()?;
        let batches = graph.batches()?;

        tracing::debug!(
            "Planned {} task(s) in {} batch(es) for '{}' in '{}'",
            active.len(),
            batches.len(),
            options.command,
            options.context
        );

        Ok(RunPlan {
            action,
            graph,
            batches,
            prior,
        })
    }

    /// Run every active task of `tasks`.
    ///
    /// Returns an error only when validation fails, before any task runs.
    pub fn run(&self, tasks: &TaskSet, options: &RunOptions) -> Result<RunResult> {
        let start = Instant::now();
        let plan = self.plan(tasks, options)?;
        let logger = options.logger.as_ref();

        logger.log(&RunEvent::RunStarted {
            command: &options.command,
            context: options.context.name(),
            tasks: plan.task_count(),
            batches: plan.batches.len(),
        });

        let execution = Execution::new(self, tasks, options, &plan);
        let total = plan.batches.len();
        let mut halted = false;
        // Task id to the reason it will be skipped
        let mut doomed: BTreeMap<String, &'static str> = BTreeMap::new();

        for (index, batch) in plan.batches.iter().enumerate() {
            if halted {
                for id in batch {
                    execution.skip(id, "run halted after a failed batch");
                }
                continue;
            }

            let mut runnable = Vec::with_capacity(batch.len());
            for id in batch {
                match doomed.get(id) {
                    Some(reason) => execution.skip(id, reason),
                    None => runnable.push(id.clone()),
                }
            }
            if runnable.is_empty() {
                continue;
            }

            logger.log(&RunEvent::BatchStarted {
                index,
                total,
                tasks: &runnable,
            });

            // Barrier: run_batch returns once every task is terminal
            pool::run_batch(&runnable, options.workers, |id| execution.process(id));

            for id in runnable.iter().filter(|id| execution.was_blocked(id)) {
                for dependent in plan.graph.transitive_dependents(id) {
                    doomed.entry(dependent).or_insert("a dependency was blocked");
                }
            }

            let failed: Vec<&String> = runnable
                .iter()
                .filter(|id| execution.status_of(id).is_some_and(|s| s.is_failure()))
                .collect();
            if failed.is_empty() {
                continue;
            }
            match options.on_failure {
                OnFailure::Halt => halted = true,
                OnFailure::SkipDependents => {
                    for id in failed {
                        for dependent in plan.graph.transitive_dependents(id) {
                            doomed.insert(dependent, "a dependency failed");
                        }
                    }
                }
            }
        }

        let records = execution.into_records();
        let status = RunStatus::from_records(records.values());
        let duration = start.elapsed();
        logger.log(&RunEvent::RunFinished { status, duration });

        Ok(RunResult {
            status,
            batches: plan.batches,
            records,
            duration,
        })
    }

    fn load_prior(&self, id: &str) -> Result<Option<ExecutionRecord>> {
        match self.state.load(id) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for WorkflowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRunner")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

/// Mutable state of one run, shared by the batch workers.
struct Execution<'r> {
    runner: &'r WorkflowRunner,
    tasks: &'r TaskSet,
    options: &'r RunOptions,
    plan: &'r RunPlan,
    records: Mutex<BTreeMap<String, ExecutionRecord>>,
    variables: Mutex<ResolvedVariables>,
}

impl<'r> Execution<'r> {
    /// Create a pending record for every planned task and seed the
    /// variables with outputs from prior state.
    fn new(
        runner: &'r WorkflowRunner,
        tasks: &'r TaskSet,
        options: &'r RunOptions,
        plan: &'r RunPlan,
    ) -> Self {
        let mut records = BTreeMap::new();
        for id in plan.batches.iter().flatten() {
            let Some(task) = tasks.get(id) else { continue };
            let record =
                ExecutionRecord::pending(task, &options.command, options.context.name())
                    .carrying(plan.prior.get(id));
            records.insert(id.clone(), record);
        }

        let mut variables = ResolvedVariables::new();
        for id in plan.external() {
            if let Some(outputs) = plan.prior.get(id).and_then(|r| r.referenceable_outputs()) {
                variables.record(id, outputs);
            }
        }

        let execution = Self {
            runner,
            tasks,
            options,
            plan,
            records: Mutex::new(records),
            variables: Mutex::new(variables),
        };
        for id in plan.batches.iter().flatten() {
            execution.update(id, |_| {});
        }
        execution
    }

    fn logger(&self) -> &dyn RunLogger {
        self.options.logger.as_ref()
    }

    fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|r| r.status)
    }

    /// Whether a hook stopped the task before its processor ran.
    fn was_blocked(&self, id: &str) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|r| {
                r.status == TaskStatus::Skipped
                    && r.error.as_ref().is_some_and(|e| e.kind == FailureKind::Blocked)
            })
    }

    fn into_records(self) -> BTreeMap<String, ExecutionRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a change to a task's record, report any transition and
    /// persist the result.
    fn update(&self, id: &str, apply: impl FnOnce(&mut ExecutionRecord)) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = records.get_mut(id) else {
            return;
        };

        let from = record.status;
        apply(record);
        if record.status != from {
            self.logger().log(&RunEvent::TaskTransition { from, record });
        }

        if let Err(err) = self.runner.state.save(id, record) {
            self.logger().log(&RunEvent::StateSaveFailed {
                task: id,
                error: &err.to_string(),
            });
        }
    }

    fn skip(&self, id: &str, reason: &str) {
        self.update(id, |r| {
            r.push_event("SKIPPED", reason);
            r.advance(TaskStatus::Skipped);
        });
    }

    fn fail(&self, id: &str, label: String, failure: TaskFailure, partial: Outputs) {
        self.update(id, |r| {
            r.push_event(label, failure.message.clone());
            r.outputs = partial;
            r.error = Some(failure);
            r.advance(TaskStatus::Failed);
        });
    }

    /// Dependencies a task may reference: in-run ones and those satisfied
    /// by prior state.
    fn declared_dependencies(&self, id: &str) -> BTreeSet<String> {
        let graph = &self.plan.graph;
        graph
            .dependencies_of(id)
            .into_iter()
            .chain(graph.external_dependencies_of(id))
            .flatten()
            .cloned()
            .collect()
    }

    /// Drive one task from Pending to a terminal status.
    fn process(&self, id: &str) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        let action = self.plan.action;
        let prior = self.plan.prior.get(id);

        self.update(id, |r| {
            r.advance(TaskStatus::Resolving);
            r.push_event("RESOLVE_START", "");
        });

        let declared = self.declared_dependencies(id);
        let resolved = {
            let variables = self.variables.lock().unwrap_or_else(PoisonError::into_inner);
            resolve_spec(id, task.spec(), &declared, &variables)
        };
        let spec = match resolved {
            Ok(spec) => spec,
            Err(err) => {
                self.fail(id, "RESOLVE_ERROR".into(), err.into(), Outputs::new());
                return;
            }
        };

        let processor = match self.runner.registry.lookup(task.task_type()) {
            Ok(processor) => processor,
            Err(err) => {
                let failure = TaskFailure::processor(err.to_string());
                self.fail(id, "DISPATCH_ERROR".into(), failure, Outputs::new());
                return;
            }
        };

        self.update(id, |r| {
            r.push_event("RESOLVE_DONE", "");
            r.advance(TaskStatus::Running);
            r.push_event(format!("{}_START", action.event_prefix()), "");
        });

        let call = HookCall {
            task,
            spec: &spec,
            command: &self.options.command,
            action,
            context: &self.options.context,
            processor,
            prior,
            logger: self.logger(),
        };

        match contain_panic(|| self.runner.hooks.run(&call)) {
            Ok(HookOutcome::Completed(outputs)) => self.complete(task, action, &spec, outputs),
            Ok(HookOutcome::Blocked { hook, reason }) => {
                let note = format!("{}: {}", hook, reason);
                self.update(id, |r| {
                    r.push_event("HOOK_BLOCKED", note.clone());
                    r.error = Some(TaskFailure::blocked(note));
                    r.advance(TaskStatus::Skipped);
                });
            }
            Err(err) => {
                let partial = err.partial_outputs().cloned().unwrap_or_default();
                let label = format!("{}_ERROR", action.event_prefix());
                self.fail(id, label, err.to_failure(), partial.clone());
                if self.should_roll_back(task, action, &err) {
                    self.roll_back(task, processor, &spec, prior, &partial);
                }
            }
        }
    }

    fn complete(&self, task: &Task, action: Action, spec: &serde_yaml::Value, outputs: Outputs) {
        let id = task.id();
        let ignored = self
            .variables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(id, &outputs);
        if !ignored.is_empty() {
            self.logger().log(&RunEvent::OutputsIgnored {
                task: id,
                keys: &ignored,
            });
        }

        self.update(id, |r| {
            r.push_event(format!("{}_DONE", action.event_prefix()), "");
            if action.is_mutating() {
                r.applied = (action != Action::Delete).then(|| AppliedState {
                    outputs: outputs.clone(),
                    spec_checksum: spec_checksum(spec),
                    applied_at: Utc::now(),
                });
            }
            r.outputs = outputs;
            r.advance(TaskStatus::Succeeded);
        });
    }

    /// Only mutating actions that reached the processor are rolled back.
    fn should_roll_back(&self, task: &Task, action: Action, err: &ProcessorError) -> bool {
        let enabled = task
            .auto_rollback()
            .unwrap_or(self.options.rollback == RollbackPolicy::FailedTask);
        enabled && action.is_mutating() && !err.is_unsupported()
    }

    fn roll_back(
        &self,
        task: &Task,
        processor: &dyn TaskProcessor,
        spec: &serde_yaml::Value,
        prior: Option<&ExecutionRecord>,
        partial: &Outputs,
    ) {
        let id = task.id();
        self.logger().log(&RunEvent::RollbackStarted { task: id });
        self.update(id, |r| r.push_event("ROLLBACK_ACTION_START", ""));

        match contain_panic(|| processor.rollback(task, spec, prior, partial)) {
            Ok(()) => {
                self.update(id, |r| {
                    r.push_event("ROLLBACK_ACTION_DONE", "");
                    r.advance(TaskStatus::RolledBack);
                });
                self.logger()
                    .log(&RunEvent::RollbackFinished { task: id, error: None });
            }
            Err(err) if err.is_unsupported() => {
                self.update(id, |r| r.push_event("ROLLBACK_ACTION_UNSUPPORTED", err.to_string()));
                self.logger().log(&RunEvent::RollbackUnsupported { task: id });
            }
            Err(err) => {
                let failure = TaskFailure::new(FailureKind::RollbackError, err.to_string());
                self.update(id, |r| {
                    r.push_event("ROLLBACK_ACTION_ERROR", failure.message.clone());
                    r.rollback_error = Some(failure.clone());
                });
                self.logger().log(&RunEvent::RollbackFinished {
                    task: id,
                    error: Some(&failure),
                });
            }
        }
    }
}

/// Turn a panic inside a processor or hook into a processor error so the
/// rest of the batch keeps running.
fn contain_panic<T>(f: impl FnOnce() -> ProcessorResult<T>) -> ProcessorResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ProcessorError::failed(format!("processor panicked: {}", message)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperariusError;
    use crate::logging::NullLogger;
    use crate::processor::PassthroughProcessor;
    use crate::state::MemoryStateStore;
    use serde_yaml::Value;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn options(command: &str) -> RunOptions {
        RunOptions::new(command).with_logger(NullLogger)
    }

    fn runner() -> WorkflowRunner {
        WorkflowRunner::new(ProcessorRegistry::new().with("echo", PassthroughProcessor))
    }

    /// Fails `create` for tasks whose spec sets `fail: true`.
    struct Flaky {
        rollback: ProcessorResult<()>,
    }

    impl Flaky {
        fn rollback_ok() -> Self {
            Self { rollback: Ok(()) }
        }
    }

    impl TaskProcessor for Flaky {
        fn create(&self, _task: &Task, spec: &Value) -> ProcessorResult<Outputs> {
            if spec.get("fail").and_then(Value::as_bool) == Some(true) {
                let mut partial = Outputs::new();
                partial.insert("half".into(), Value::Bool(true));
                return Err(ProcessorError::with_partial("create exploded", partial));
            }
            Ok(Outputs::new())
        }

        fn rollback(
            &self,
            _task: &Task,
            _spec: &Value,
            _prior: Option<&ExecutionRecord>,
            partial: &Outputs,
        ) -> ProcessorResult<()> {
            assert_eq!(partial.get("half"), Some(&Value::Bool(true)));
            match &self.rollback {
                Ok(()) => Ok(()),
                Err(err) => Err(ProcessorError::failed(err.to_string())),
            }
        }
    }

    #[test]
    fn plan_rejects_unknown_command() {
        let tasks = TaskSet::from_tasks([Task::new("a", "echo", Value::Null)]).unwrap();
        let err = runner().plan(&tasks, &options("launch")).unwrap_err();
        assert!(matches!(err, OperariusError::UnknownCommand { .. }));
    }

    #[test]
    fn plan_orders_active_tasks() {
        let tasks = TaskSet::from_tasks([
            Task::new("b", "echo", Value::Null).depends_on(["a"]),
            Task::new("a", "echo", Value::Null),
            Task::new("c", "echo", Value::Null).in_context("staging"),
        ])
        .unwrap();
        let plan = runner().plan(&tasks, &options("create")).unwrap();
        assert_eq!(plan.batches, vec![vec!["a"], vec!["b"]]);
        assert_eq!(plan.action, Action::Create);
        assert_eq!(plan.task_count(), 2);
    }

    #[test]
    fn reference_flows_to_dependent() {
        let tasks = TaskSet::from_tasks([
            Task::new("a", "echo", yaml("path: /tmp/x")),
            Task::new("b", "echo", yaml("target: ${VAR:a:path}")).depends_on(["a"]),
        ])
        .unwrap();
        let result = runner().run(&tasks, &options("create")).unwrap();

        assert_eq!(result.status, RunStatus::Succeeded);
        let b = result.record("b").unwrap();
        assert_eq!(b.outputs["target"], Value::from("/tmp/x"));
        let labels: Vec<_> = b.events.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "RESOLVE_START",
                "RESOLVE_DONE",
                "CREATE_ACTION_START",
                "CREATE_ACTION_DONE"
            ]
        );
        assert!(b.applied.is_some());
    }

    #[test]
    fn failure_rolls_back_and_halts() {
        let registry = ProcessorRegistry::new().with("flaky", Flaky::rollback_ok());
        let tasks = TaskSet::from_tasks([
            Task::new("a", "flaky", yaml("fail: true")),
            Task::new("b", "flaky", Value::Null).depends_on(["a"]),
        ])
        .unwrap();
        let result = WorkflowRunner::new(registry)
            .run(&tasks, &options("create"))
            .unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.status_of("a"), Some(TaskStatus::RolledBack));
        assert_eq!(result.status_of("b"), Some(TaskStatus::Skipped));
        let a = result.record("a").unwrap();
        assert_eq!(a.error.as_ref().unwrap().kind, FailureKind::ProcessorError);
        assert!(a.applied.is_none());
    }

    #[test]
    fn rollback_error_is_partial_failure() {
        let registry = ProcessorRegistry::new().with(
            "flaky",
            Flaky {
                rollback: Err(ProcessorError::failed("cannot undo")),
            },
        );
        let tasks = TaskSet::from_tasks([Task::new("a", "flaky", yaml("fail: true"))]).unwrap();
        let result = WorkflowRunner::new(registry)
            .run(&tasks, &options("create"))
            .unwrap();

        assert_eq!(result.status, RunStatus::PartialFailure);
        let a = result.record("a").unwrap();
        assert_eq!(a.status, TaskStatus::Failed);
        assert_eq!(
            a.rollback_error.as_ref().unwrap().kind,
            FailureKind::RollbackError
        );
    }

    #[test]
    fn task_override_disables_rollback() {
        let registry = ProcessorRegistry::new().with("flaky", Flaky::rollback_ok());
        let tasks = TaskSet::from_tasks([
            Task::new("a", "flaky", yaml("fail: true")).with_auto_rollback(false)
        ])
        .unwrap();
        let result = WorkflowRunner::new(registry)
            .run(&tasks, &options("create"))
            .unwrap();
        assert_eq!(result.status_of("a"), Some(TaskStatus::Failed));
    }

    #[test]
    fn unsupported_action_fails_without_rollback() {
        let tasks = TaskSet::from_tasks([Task::new("a", "flaky", Value::Null)]).unwrap();
        let registry = ProcessorRegistry::new().with("flaky", Flaky::rollback_ok());
        let result = WorkflowRunner::new(registry)
            .run(&tasks, &options("delete"))
            .unwrap();
        let a = result.record("a").unwrap();
        assert_eq!(a.status, TaskStatus::Failed);
        assert_eq!(a.error.as_ref().unwrap().kind, FailureKind::UnsupportedCommand);
        assert!(!a.events.iter().any(|e| e.label.starts_with("ROLLBACK")));
    }

    #[test]
    fn undeclared_reference_fails_before_processor() {
        let tasks = TaskSet::from_tasks([
            Task::new("a", "echo", yaml("path: /tmp/x")),
            Task::new("b", "echo", Value::Null).depends_on(["a"]),
            Task::new("c", "echo", yaml("p: ${VAR:a:path}")).depends_on(["b"]),
        ])
        .unwrap();
        let result = runner().run(&tasks, &options("create")).unwrap();
        let c = result.record("c").unwrap();
        assert_eq!(c.status, TaskStatus::Failed);
        assert_eq!(
            c.error.as_ref().unwrap().kind,
            FailureKind::UndeclaredDependencyReference
        );
        assert!(!c.events.iter().any(|e| e.label == "CREATE_ACTION_START"));
    }

    #[test]
    fn delete_clears_applied_state() {
        let store = Arc::new(MemoryStateStore::new());
        let runner = runner().with_state(store.clone());
        let tasks = TaskSet::from_tasks([Task::new("a", "echo", yaml("k: v"))]).unwrap();

        runner.run(&tasks, &options("create")).unwrap();
        assert!(store.load("a").unwrap().applied.is_some());

        runner.run(&tasks, &options("delete")).unwrap();
        let record = store.load("a").unwrap();
        assert_eq!(record.command, "delete");
        assert!(record.applied.is_none());
    }

    #[test]
    fn contain_panic_reports_message() {
        let err = contain_panic::<()>(|| panic!("disk on fire")).unwrap_err();
        assert!(err.to_string().contains("processor panicked: disk on fire"));

        let owned = contain_panic::<()>(|| panic!("{} retries", 3)).unwrap_err();
        assert!(owned.to_string().contains("3 retries"));

        assert!(contain_panic(|| Ok(1)).is_ok());
    }

    #[test]
    fn plan_expands_label_dependencies() {
        use crate::task::LabelSelector;

        let tasks = TaskSet::from_tasks([
            Task::new("db", "echo", Value::Null).with_label("tier", "data"),
            Task::new("cache", "echo", Value::Null).with_label("tier", "data"),
            Task::new("app", "echo", Value::Null)
                .depends_on_label(LabelSelector::new("tier", "data")),
        ])
        .unwrap();
        let plan = runner().plan(&tasks, &options("create")).unwrap();
        assert_eq!(plan.batches, vec![vec!["cache", "db"], vec!["app"]]);
    }

    #[test]
    fn options_clamp_workers() {
        assert_eq!(RunOptions::new("create").with_workers(0).workers, 1);
        assert!(format!("{:?}", RunOptions::default()).contains("command: \"create\""));
    }
}
