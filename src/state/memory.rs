//! In-process state store.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{StateError, StatePersistence};
use crate::task::ExecutionRecord;

/// Keeps records in memory for the life of the process.
///
/// Share one store across several runs to give later runs prior state.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<BTreeMap<String, ExecutionRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a record.
    pub fn with_record(self, record: ExecutionRecord) -> Self {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.task_id.clone(), record);
        self
    }

    /// Copy of every stored record.
    pub fn records(&self) -> BTreeMap<String, ExecutionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatePersistence for MemoryStateStore {
    fn load(&self, task_id: &str) -> Result<ExecutionRecord, StateError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
            .ok_or_else(|| StateError::not_found(task_id))
    }

    fn save(&self, task_id: &str, record: &ExecutionRecord) -> Result<(), StateError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.to_string(), record.clone());
        Ok(())
    }
}
