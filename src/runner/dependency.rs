//! Dependency graph for task processing order.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MissingEdge, OperariusError, Result};

/// Represents the dependency relationships between the tasks of a run.
///
/// Dependencies satisfied by persisted prior state are recorded as
/// external and do not take part in ordering.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of task id to its direct in-run dependencies.
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Map of task id to tasks that depend on it.
    dependents: BTreeMap<String, BTreeSet<String>>,
    /// Map of task id to dependencies satisfied by prior state.
    external: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Get the direct in-run dependencies of a task.
    pub fn dependencies_of(&self, task: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(task)
    }

    /// Get tasks that depend on the given task.
    pub fn dependents_of(&self, task: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(task)
    }

    /// Get dependencies of a task that come from persisted prior state.
    pub fn external_dependencies_of(&self, task: &str) -> Option<&BTreeSet<String>> {
        self.external.get(task)
    }

    /// Every dependency satisfied by prior state, across all tasks.
    pub fn external_dependencies(&self) -> BTreeSet<&str> {
        self.external
            .values()
            .flat_map(|deps| deps.iter().map(String::as_str))
            .collect()
    }

    /// Check if a task exists in the graph.
    pub fn contains(&self, task: &str) -> bool {
        self.dependencies.contains_key(task)
    }

    /// All task ids, ascending.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Get the number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Returns batches of tasks that can execute concurrently.
    ///
    /// Each batch holds every task whose dependencies were all placed in
    /// earlier batches. Ids within a batch are ascending. Fails with
    /// [`OperariusError::CycleDetected`] naming every task on a cycle.
    pub fn batches(&self) -> Result<Vec<Vec<String>>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(task, deps)| (task.as_str(), deps.len()))
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(task, _)| *task)
            .collect();

        let mut batches = Vec::new();
        let mut placed = 0;

        while !ready.is_empty() {
            let batch: Vec<&str> = ready.iter().copied().collect();
            let mut next = BTreeSet::new();

            for task in &batch {
                if let Some(dependents) = self.dependents.get(*task) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.insert(dependent.as_str());
                            }
                        }
                    }
                }
            }

            placed += batch.len();
            batches.push(batch.into_iter().map(String::from).collect());
            ready = next;
        }

        if placed != self.dependencies.len() {
            let remaining: BTreeSet<&str> = in_degree
                .iter()
                .filter(|(_, &d)| d > 0)
                .map(|(t, _)| *t)
                .collect();

            let tasks: Vec<String> = remaining
                .iter()
                .filter(|t| self.on_cycle(t, &remaining))
                .map(|t| t.to_string())
                .collect();

            tracing::debug!("Cycle detected between tasks: {:?}", tasks);
            return Err(OperariusError::CycleDetected { tasks });
        }

        Ok(batches)
    }

    /// Returns tasks in a valid processing order (dependencies first).
    pub fn topological_order(&self) -> Result<Vec<String>> {
        Ok(self.batches()?.into_iter().flatten().collect())
    }

    /// Check whether `task` can reach itself through `within`.
    fn on_cycle(&self, task: &str, within: &BTreeSet<&str>) -> bool {
        let mut seen = BTreeSet::new();
        let mut to_visit: Vec<&str> = vec![task];

        while let Some(current) = to_visit.pop() {
            if let Some(deps) = self.dependencies.get(current) {
                for dep in deps {
                    if dep == task {
                        return true;
                    }
                    if within.contains(dep.as_str()) && seen.insert(dep.as_str()) {
                        to_visit.push(dep.as_str());
                    }
                }
            }
        }

        false
    }

    /// Get all transitive dependents of a task.
    ///
    /// Returns tasks that depend on the given task, directly or indirectly.
    pub fn transitive_dependents(&self, task: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut to_visit = vec![task.to_string()];

        while let Some(current) = to_visit.pop() {
            if let Some(dependents) = self.dependents.get(&current) {
                for dep in dependents {
                    if result.insert(dep.clone()) {
                        to_visit.push(dep.clone());
                    }
                }
            }
        }

        result
    }
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    prior: BTreeSet<String>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with its dependencies.
    pub fn add_task<I, S>(mut self, id: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .entry(id.into())
            .or_default()
            .extend(depends_on.into_iter().map(Into::into));
        self
    }

    /// Declare ids that have persisted state from a prior run.
    ///
    /// Dependencies on these ids are satisfied even when the task is not
    /// part of this run.
    pub fn with_prior_state<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prior.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Build the dependency graph.
    ///
    /// Every edge is checked before failing, so a single
    /// [`OperariusError::MissingDependency`] reports all missing edges.
    pub fn build(self) -> Result<DependencyGraph> {
        let mut missing = Vec::new();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut external: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (task, deps) in &self.dependencies {
            let mut in_run = BTreeSet::new();
            for dep in deps {
                if self.dependencies.contains_key(dep) {
                    in_run.insert(dep.clone());
                } else if self.prior.contains(dep) {
                    external.entry(task.clone()).or_default().insert(dep.clone());
                } else {
                    missing.push(MissingEdge {
                        task: task.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            dependencies.insert(task.clone(), in_run);
        }

        if !missing.is_empty() {
            missing.sort();
            return Err(OperariusError::MissingDependency { edges: missing });
        }

        // Build dependents map (reverse lookup)
        let mut dependents: BTreeMap<String, BTreeSet<String>> = dependencies
            .keys()
            .map(|task| (task.clone(), BTreeSet::new()))
            .collect();

        for (task, deps) in &dependencies {
            for dep in deps {
                if let Some(set) = dependents.get_mut(dep) {
                    set.insert(task.clone());
                }
            }
        }

        Ok(DependencyGraph {
            dependencies,
            dependents,
            external,
        })
    }
}
