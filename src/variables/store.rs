//! The Resolved Variable Set.

use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::task::Outputs;

/// Outputs produced by completed tasks, keyed by task id and output key.
///
/// The set is append-only: once a `(task, key)` pair holds a value, later
/// writes to the same pair are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedVariables {
    outputs: BTreeMap<String, Outputs>,
}

impl ResolvedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outputs of a task.
    ///
    /// Returns the keys that were already present and therefore ignored.
    pub fn record(&mut self, task: &str, outputs: &Outputs) -> Vec<String> {
        let entry = self.outputs.entry(task.to_string()).or_default();
        let mut ignored = Vec::new();
        for (key, value) in outputs {
            if entry.contains_key(key) {
                ignored.push(key.clone());
            } else {
                entry.insert(key.clone(), value.clone());
            }
        }
        ignored
    }

    /// Look up an output value.
    ///
    /// The full key is tried first. A `:`-separated key that is not present
    /// verbatim is then walked through nested mappings and sequences, so
    /// `endpoint:port` finds `port` inside the `endpoint` output.
    pub fn get(&self, task: &str, key: &str) -> Option<&Value> {
        let outputs = self.outputs.get(task)?;
        if let Some(value) = outputs.get(key) {
            return Some(value);
        }

        let mut parts = key.split(':');
        let mut current = outputs.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Mapping(map) => map.get(part)?,
                Value::Sequence(seq) => seq.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Outputs recorded for a task.
    pub fn task_outputs(&self, task: &str) -> Option<&Outputs> {
        self.outputs.get(task)
    }

    pub fn contains_task(&self, task: &str) -> bool {
        self.outputs.contains_key(task)
    }

    /// Number of tasks with recorded outputs.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Consume the set, returning outputs per task.
    pub fn into_inner(self) -> BTreeMap<String, Outputs> {
        self.outputs
    }
}
