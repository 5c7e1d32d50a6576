//! YAML file state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{StateError, StatePersistence};
use crate::task::ExecutionRecord;

/// On-disk layout of a state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Schema version for migration.
    pub version: u32,

    /// When any record was last saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Latest record per task.
    #[serde(default)]
    pub tasks: BTreeMap<String, ExecutionRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: StateFile::CURRENT_VERSION,
            updated_at: None,
            tasks: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Read a state file. A missing file yields an empty state.
    pub fn read(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| StateError::Serialization {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Write the state file using the write-to-temp-then-rename pattern.
    pub fn write(&self, path: &Path) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let content = serde_yaml::to_string(self).map_err(|e| StateError::Serialization {
            message: e.to_string(),
        })?;

        // Atomic write: a crash mid-write leaves the previous file intact
        let temp_path = path.with_extension("yml.tmp");
        fs::write(&temp_path, &content).map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)?;

        Ok(())
    }
}

/// Persists records to a YAML file, rewriting it on every save.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl FileStateStore {
    /// Open a store at `path`, reading any existing records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = StateFile::read(&path)?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(StateError::Serialization {
                message: format!(
                    "{}: unsupported state version {}",
                    path.display(),
                    state.version
                ),
            });
        }
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of every stored record.
    pub fn records(&self) -> BTreeMap<String, ExecutionRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .clone()
    }
}

impl StatePersistence for FileStateStore {
    fn load(&self, task_id: &str) -> Result<ExecutionRecord, StateError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| StateError::not_found(task_id))
    }

    fn save(&self, task_id: &str, record: &ExecutionRecord) -> Result<(), StateError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tasks.insert(task_id.to_string(), record.clone());
        state.updated_at = Some(Utc::now());
        state.write(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskStatus};
    use serde_yaml::Value;
    use tempfile::TempDir;

    fn record(id: &str) -> ExecutionRecord {
        ExecutionRecord::pending(&Task::new(id, "t", Value::Null), "create", "production")
    }

    #[test]
    fn open_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::open(temp.path().join("state.yml")).unwrap();
        assert!(store.records().is_empty());
        assert!(store.load("a").unwrap_err().is_not_found());
    }

    #[test]
    fn save_writes_file_and_reopen_reads_it() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.yml");

        let store = FileStateStore::open(&path).unwrap();
        let mut rec = record("db");
        rec.outputs.insert("host".into(), Value::from("db.internal"));
        store.save("db", &rec).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("yml.tmp").exists());

        let reopened = FileStateStore::open(&path).unwrap();
        let loaded = reopened.load("db").unwrap();
        assert_eq!(loaded.outputs["host"], Value::from("db.internal"));
        assert_eq!(loaded.context, "production");
    }

    #[test]
    fn save_keeps_other_tasks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        let store = FileStateStore::open(&path).unwrap();
        store.save("a", &record("a")).unwrap();
        let mut b = record("b");
        b.advance(TaskStatus::Skipped);
        store.save("b", &b).unwrap();

        let file = StateFile::read(&path).unwrap();
        assert_eq!(file.tasks.len(), 2);
        assert_eq!(file.tasks["b"].status, TaskStatus::Skipped);
        assert!(file.updated_at.is_some());
    }

    #[test]
    fn corrupt_file_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        fs::write(&path, "tasks: [not, a, map").unwrap();
        assert!(matches!(
            FileStateStore::open(&path),
            Err(StateError::Serialization { .. })
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.yml");
        fs::write(&path, "version: 99\ntasks: {}\n").unwrap();
        assert!(FileStateStore::open(&path).is_err());
    }
}
