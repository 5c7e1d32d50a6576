//! Manifest loading shared by the commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{load_manifest, state_file_path, validate_manifest, Settings};
use crate::error::Result;
use crate::processor::{CommandTable, PassthroughProcessor, ProcessorRegistry, ShellProcessor};
use crate::runner::WorkflowRunner;
use crate::state::{FileStateStore, NoPersistence, StatePersistence};
use crate::task::TaskSet;

/// A validated manifest, ready to run.
#[derive(Debug)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub settings: Settings,
    pub commands: CommandTable,
    pub tasks: TaskSet,
    /// State file from the manifest settings, resolved against its directory.
    pub state_file: Option<PathBuf>,
}

impl LoadedManifest {
    /// Load, validate and build the tasks of a manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest = load_manifest(path)?;
        validate_manifest(&manifest)?;

        let commands = manifest.command_table()?;
        let state_file = state_file_path(&manifest, path);
        let settings = manifest.settings.clone();
        let tasks = manifest.into_tasks()?;

        Ok(Self {
            path: path.to_path_buf(),
            settings,
            commands,
            tasks,
            state_file,
        })
    }

    /// Directory shell tasks run in by default.
    fn base_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// A runner with the built-in processors and the manifest's hooks and
    /// commands. `state_override` takes precedence over the manifest's
    /// state file.
    pub fn runner(&self, state_override: Option<&Path>) -> Result<WorkflowRunner> {
        let state: Arc<dyn StatePersistence> =
            match state_override.or(self.state_file.as_deref()) {
                Some(path) => Arc::new(FileStateStore::open(path)?),
                None => Arc::new(NoPersistence),
            };

        Ok(WorkflowRunner::new(builtin_registry(self.base_dir()))
            .with_hooks(self.settings.hook_chain())
            .with_commands(self.commands.clone())
            .with_state(state))
    }
}

/// Registry with the `passthrough` and `shell` processors.
pub fn builtin_registry(shell_cwd: Option<&Path>) -> ProcessorRegistry {
    let shell = match shell_cwd {
        Some(dir) => ShellProcessor::new().with_cwd(dir),
        None => ShellProcessor::new(),
    };
    ProcessorRegistry::new()
        .with(PassthroughProcessor::TYPE, PassthroughProcessor)
        .with(ShellProcessor::TYPE, shell)
}
