//! Task type to processor lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::TaskProcessor;
use crate::error::{OperariusError, Result};

/// Maps task types to their processors.
///
/// Registering a type twice replaces the earlier processor.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Arc<dyn TaskProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for a task type.
    pub fn register(
        &mut self,
        task_type: impl Into<String>,
        processor: impl TaskProcessor + 'static,
    ) -> &mut Self {
        self.register_shared(task_type, Arc::new(processor))
    }

    /// Register a processor that is shared with other owners.
    pub fn register_shared(
        &mut self,
        task_type: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
    ) -> &mut Self {
        let task_type = task_type.into();
        if self.processors.insert(task_type.clone(), processor).is_some() {
            tracing::debug!("Replaced processor for task type '{}'", task_type);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        task_type: impl Into<String>,
        processor: impl TaskProcessor + 'static,
    ) -> Self {
        self.register(task_type, processor);
        self
    }

    /// Look up the processor for a task type.
    pub fn lookup(&self, task_type: &str) -> Result<&dyn TaskProcessor> {
        self.processors
            .get(task_type)
            .map(|p| p.as_ref())
            .ok_or_else(|| OperariusError::MissingProcessor {
                types: vec![task_type.to_string()],
            })
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.processors.contains_key(task_type)
    }

    /// Registered task types, ascending.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    /// Check that every given type has a processor.
    ///
    /// All unregistered types are reported together.
    pub fn ensure_registered<'a>(&self, types: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let missing: BTreeSet<&str> = types.into_iter().filter(|t| !self.contains(t)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(OperariusError::MissingProcessor {
            types: missing.into_iter().map(String::from).collect(),
        })
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("types", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}
