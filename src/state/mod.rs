//! Persistence of execution records between runs.
//!
//! The controller loads every task's prior record before the run and
//! saves the record again at each status transition. Implementations:
//!
//! - [`NoPersistence`] - No history; every load is `NotFound`
//! - [`MemoryStateStore`] - In-process store, shared across runs
//! - [`FileStateStore`] - YAML file with atomic writes

pub mod file;
pub mod memory;

pub use file::{FileStateStore, StateFile};
pub use memory::MemoryStateStore;

use std::path::PathBuf;
use thiserror::Error;

use crate::task::ExecutionRecord;

/// Errors from a state backend.
#[derive(Debug, Error)]
pub enum StateError {
    /// Nothing was persisted for the task.
    #[error("No persisted state for task '{task_id}'")]
    NotFound { task_id: String },

    /// Reading or writing the backing storage failed.
    #[error("Failed to access state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored state could not be encoded or decoded.
    #[error("Invalid state data: {message}")]
    Serialization { message: String },
}

impl StateError {
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self::NotFound {
            task_id: task_id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Storage for execution records, keyed by task id.
pub trait StatePersistence: Send + Sync {
    /// Load the last saved record for a task.
    ///
    /// Returns [`StateError::NotFound`] when nothing was saved.
    fn load(&self, task_id: &str) -> Result<ExecutionRecord, StateError>;

    /// Save a task's record, replacing any earlier one.
    fn save(&self, task_id: &str, record: &ExecutionRecord) -> Result<(), StateError>;
}

/// A backend that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl StatePersistence for NoPersistence {
    fn load(&self, task_id: &str) -> Result<ExecutionRecord, StateError> {
        Err(StateError::not_found(task_id))
    }

    fn save(&self, _task_id: &str, _record: &ExecutionRecord) -> Result<(), StateError> {
        Ok(())
    }
}
