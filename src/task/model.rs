//! Task definitions and the per-run task set.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{OperariusError, Result};

/// Name of the context used when none is given.
pub const DEFAULT_CONTEXT: &str = "default";

/// A named execution environment, such as `production`.
///
/// A run processes exactly one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    /// Create a context with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The context name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT)
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a scope admits or removes the runs it matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    #[default]
    Include,
    Exclude,
}

impl ScopeMode {
    fn is_include(&self) -> bool {
        matches!(self, ScopeMode::Include)
    }
}

/// Restricts a task (or a hook) to certain commands and/or contexts.
///
/// An empty list places no restriction on that axis. An `exclude` scope
/// removes the runs it matches, even when an `include` scope admits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingScope {
    #[serde(skip_serializing_if = "ScopeMode::is_include")]
    pub mode: ScopeMode,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

impl ProcessingScope {
    /// An include scope for the given commands and contexts.
    pub fn include<C, X>(commands: C, contexts: X) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        X: IntoIterator,
        X::Item: Into<String>,
    {
        Self {
            mode: ScopeMode::Include,
            commands: commands.into_iter().map(Into::into).collect(),
            contexts: contexts.into_iter().map(Into::into).collect(),
        }
    }

    /// An exclude scope for the given commands and contexts.
    pub fn exclude<C, X>(commands: C, contexts: X) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        X: IntoIterator,
        X::Item: Into<String>,
    {
        Self {
            mode: ScopeMode::Exclude,
            ..Self::include(commands, contexts)
        }
    }

    /// Check whether this scope's filters match the command/context pair,
    /// regardless of its mode.
    pub fn matches(&self, command: &str, context: &Context) -> bool {
        filter_matches(&self.commands, command) && filter_matches(&self.contexts, context.name())
    }

    /// Check whether a list of scopes admits the command/context pair.
    ///
    /// No exclude scope may match, and when include scopes exist at least
    /// one of them must match.
    pub fn admits(scopes: &[ProcessingScope], command: &str, context: &Context) -> bool {
        let mut includes = scopes.iter().filter(|s| s.mode.is_include()).peekable();
        let included = includes.peek().is_none() || includes.any(|s| s.matches(command, context));
        let excluded = scopes
            .iter()
            .filter(|s| !s.mode.is_include())
            .any(|s| s.matches(command, context));
        included && !excluded
    }
}

/// Selects every task carrying a label.
///
/// Without a value, any task with the key matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// A selector matching any value of `key`.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match (task.labels.get(&self.key), &self.value) {
            (Some(actual), Some(wanted)) => actual == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => f.write_str(&self.key),
        }
    }
}

/// Dependencies that only apply for some commands and/or contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalDependency {
    pub tasks: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

impl ConditionalDependency {
    /// Check whether these dependencies apply to the command/context pair.
    pub fn applies(&self, command: &str, context: &Context) -> bool {
        filter_matches(&self.commands, command) && filter_matches(&self.contexts, context.name())
    }
}

fn filter_matches(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| a == value)
}

/// Compute the hex SHA-256 checksum of a spec.
///
/// The spec is hashed in its YAML rendering, which keeps mapping order.
pub fn spec_checksum(spec: &Value) -> String {
    let rendered = serde_yaml::to_string(spec).unwrap_or_default();
    hex::encode(Sha256::digest(rendered.as_bytes()))
}

/// A declared unit of work.
///
/// Tasks are built once and not changed afterwards; the builder-style
/// methods consume and return the task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: String,
    task_type: String,
    spec: Value,
    depends_on: BTreeSet<String>,
    label_dependencies: Vec<LabelSelector>,
    conditional: Vec<ConditionalDependency>,
    labels: BTreeMap<String, String>,
    context: Option<String>,
    scopes: Vec<ProcessingScope>,
    auto_rollback: Option<bool>,
}

impl Task {
    /// Create a task with an explicit id.
    pub fn new(id: impl Into<String>, task_type: impl Into<String>, spec: Value) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            spec,
            depends_on: BTreeSet::new(),
            label_dependencies: Vec::new(),
            conditional: Vec::new(),
            labels: BTreeMap::new(),
            context: None,
            scopes: Vec::new(),
            auto_rollback: None,
        }
    }

    /// Create a task whose id is derived from its spec.
    ///
    /// The id is the first 16 hex characters of the spec checksum.
    pub fn with_derived_id(task_type: impl Into<String>, spec: Value) -> Self {
        let id = spec_checksum(&spec)[..16].to_string();
        Self::new(id, task_type, spec)
    }

    /// Add unconditional dependencies.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Depend on every active task the selector matches.
    pub fn depends_on_label(mut self, selector: LabelSelector) -> Self {
        self.label_dependencies.push(selector);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add dependencies that only apply for matching commands/contexts.
    pub fn with_conditional_dependency(mut self, dependency: ConditionalDependency) -> Self {
        self.conditional.push(dependency);
        self
    }

    /// Restrict the task to a single context.
    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a processing scope.
    pub fn with_scope(mut self, scope: ProcessingScope) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Override the run's rollback policy for this task.
    pub fn with_auto_rollback(mut self, enabled: bool) -> Self {
        self.auto_rollback = Some(enabled);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn spec(&self) -> &Value {
        &self.spec
    }

    /// Unconditional dependency ids.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn label_dependencies(&self) -> &[LabelSelector] {
        &self.label_dependencies
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn conditional_dependencies(&self) -> &[ConditionalDependency] {
        &self.conditional
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn scopes(&self) -> &[ProcessingScope] {
        &self.scopes
    }

    pub fn auto_rollback(&self) -> Option<bool> {
        self.auto_rollback
    }

    /// Check whether the task takes part in a run of `command` in `context`.
    pub fn is_active(&self, command: &str, context: &Context) -> bool {
        let context_ok = self
            .context
            .as_deref()
            .map(|c| c == context.name())
            .unwrap_or(true);
        context_ok && ProcessingScope::admits(&self.scopes, command, context)
    }

    /// Dependencies in effect for a run of `command` in `context`.
    pub fn effective_dependencies(&self, command: &str, context: &Context) -> BTreeSet<String> {
        let mut deps = self.depends_on.clone();
        for conditional in &self.conditional {
            if conditional.applies(command, context) {
                deps.extend(conditional.tasks.iter().cloned());
            }
        }
        deps
    }
}

/// The tasks declared for a run, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: BTreeMap<String, Task>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, failing on the first duplicate id.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut set = Self::new();
        for task in tasks {
            set.insert(task)?;
        }
        Ok(set)
    }

    /// Add a task.
    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(task.id()) {
            return Err(OperariusError::DuplicateTaskId {
                id: task.id().to_string(),
            });
        }
        self.tasks.insert(task.id().to_string(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Tasks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks that take part in a run of `command` in `context`.
    pub fn active(&self, command: &str, context: &Context) -> Vec<&Task> {
        self.iter()
            .filter(|t| t.is_active(command, context))
            .collect()
    }

    /// Dependencies of `task` in a run of `command` in `context`.
    ///
    /// Label selectors expand to the other active tasks carrying the label;
    /// a selector matching nothing adds no dependency.
    pub fn run_dependencies(
        &self,
        task: &Task,
        command: &str,
        context: &Context,
    ) -> BTreeSet<String> {
        let mut deps = task.effective_dependencies(command, context);
        if task.label_dependencies.is_empty() {
            return deps;
        }
        for candidate in self.active(command, context) {
            if candidate.id() != task.id()
                && task.label_dependencies.iter().any(|s| s.matches(candidate))
            {
                deps.insert(candidate.id().to_string());
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn derived_id_is_stable_checksum_prefix() {
        let a = Task::with_derived_id("file", spec("path: /tmp/x"));
        let b = Task::with_derived_id("file", spec("path: /tmp/x"));
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 16);
        assert_eq!(a.id(), &spec_checksum(a.spec())[..16]);
    }

    #[test]
    fn derived_id_differs_for_different_specs() {
        let a = Task::with_derived_id("file", spec("path: /tmp/x"));
        let b = Task::with_derived_id("file", spec("path: /tmp/y"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn task_without_context_is_active_everywhere() {
        let task = Task::new("a", "file", Value::Null);
        assert!(task.is_active("create", &Context::new("production")));
        assert!(task.is_active("delete", &Context::default()));
    }

    #[test]
    fn task_with_context_only_active_in_it() {
        let task = Task::new("a", "file", Value::Null).in_context("production");
        assert!(task.is_active("create", &Context::new("production")));
        assert!(!task.is_active("create", &Context::new("staging")));
    }

    #[test]
    fn scopes_restrict_commands_and_contexts() {
        let task = Task::new("a", "file", Value::Null)
            .with_scope(ProcessingScope::include(["create"], ["production"]))
            .with_scope(ProcessingScope::include(["describe"], Vec::<String>::new()));

        assert!(task.is_active("create", &Context::new("production")));
        assert!(!task.is_active("create", &Context::new("staging")));
        assert!(task.is_active("describe", &Context::new("staging")));
        assert!(!task.is_active("delete", &Context::new("production")));
    }

    #[test]
    fn empty_scope_matches_everything() {
        let task = Task::new("a", "file", Value::Null).with_scope(ProcessingScope::default());
        assert!(task.is_active("anything", &Context::new("anywhere")));
    }

    #[test]
    fn conditional_dependencies_apply_per_command() {
        let task = Task::new("app", "svc", Value::Null)
            .depends_on(["db"])
            .with_conditional_dependency(ConditionalDependency {
                tasks: vec!["backup".into()],
                commands: vec!["delete".into()],
                contexts: vec![],
            });

        let create = task.effective_dependencies("create", &Context::default());
        assert_eq!(create.into_iter().collect::<Vec<_>>(), vec!["db"]);

        let delete = task.effective_dependencies("delete", &Context::default());
        assert_eq!(delete.into_iter().collect::<Vec<_>>(), vec!["backup", "db"]);
    }

    #[test]
    fn task_set_rejects_duplicate_ids() {
        let result = TaskSet::from_tasks([
            Task::new("a", "file", Value::Null),
            Task::new("a", "file", Value::Null),
        ]);
        assert!(matches!(
            result,
            Err(OperariusError::DuplicateTaskId { id }) if id == "a"
        ));
    }

    #[test]
    fn task_set_iterates_in_id_order() {
        let set = TaskSet::from_tasks([
            Task::new("c", "t", Value::Null),
            Task::new("a", "t", Value::Null),
            Task::new("b", "t", Value::Null),
        ])
        .unwrap();
        let ids: Vec<_> = set.iter().map(Task::id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn active_filters_by_context() {
        let set = TaskSet::from_tasks([
            Task::new("a", "t", Value::Null),
            Task::new("b", "t", Value::Null).in_context("staging"),
        ])
        .unwrap();
        let active: Vec<_> = set
            .active("create", &Context::new("production"))
            .into_iter()
            .map(Task::id)
            .collect();
        assert_eq!(active, vec!["a"]);
    }

    #[test]
    fn exclude_scope_removes_matching_runs() {
        let task = Task::new("a", "file", Value::Null)
            .with_scope(ProcessingScope::exclude(["delete"], ["production"]));

        assert!(task.is_active("create", &Context::new("production")));
        assert!(task.is_active("delete", &Context::new("staging")));
        assert!(!task.is_active("delete", &Context::new("production")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let task = Task::new("a", "file", Value::Null)
            .with_scope(ProcessingScope::include(
                Vec::<String>::new(),
                ["production", "staging"],
            ))
            .with_scope(ProcessingScope::exclude(["delete"], Vec::<String>::new()));

        assert!(task.is_active("create", &Context::new("staging")));
        assert!(!task.is_active("delete", &Context::new("staging")));
        assert!(!task.is_active("create", &Context::new("sandbox")));
    }

    #[test]
    fn label_selector_matches_key_and_value() {
        let task = Task::new("a", "t", Value::Null).with_label("tier", "data");
        assert!(LabelSelector::new("tier", "data").matches(&task));
        assert!(!LabelSelector::new("tier", "web").matches(&task));
        assert!(LabelSelector::key("tier").matches(&task));
        assert!(!LabelSelector::key("team").matches(&task));
    }

    #[test]
    fn label_dependencies_expand_to_active_tasks() {
        let set = TaskSet::from_tasks([
            Task::new("db", "t", Value::Null).with_label("tier", "data"),
            Task::new("cache", "t", Value::Null).with_label("tier", "data"),
            Task::new("queue", "t", Value::Null)
                .with_label("tier", "data")
                .in_context("staging"),
            Task::new("app", "t", Value::Null)
                .with_label("tier", "data")
                .depends_on_label(LabelSelector::new("tier", "data")),
        ])
        .unwrap();

        let app = set.get("app").unwrap();
        let deps = set.run_dependencies(app, "create", &Context::default());
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["cache", "db"]);
    }

    #[test]
    fn unmatched_label_selector_adds_nothing() {
        let set = TaskSet::from_tasks([Task::new("app", "t", Value::Null)
            .depends_on(["db"])
            .depends_on_label(LabelSelector::key("tier"))])
        .unwrap();

        let app = set.get("app").unwrap();
        let deps = set.run_dependencies(app, "create", &Context::default());
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["db"]);
    }
}
