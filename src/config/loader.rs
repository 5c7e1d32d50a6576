//! Manifest loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::Manifest;
use crate::error::{OperariusError, Result};

/// Load a manifest file and parse it.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OperariusError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            OperariusError::Io(e)
        }
    })?;

    parse_manifest(&content, path)
}

/// Parse YAML content into a [`Manifest`].
///
/// `source_path` is only used for error reporting.
pub fn parse_manifest(content: &str, source_path: &Path) -> Result<Manifest> {
    serde_yaml::from_str(content).map_err(|e| OperariusError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Resolve the manifest's state file against the manifest's directory.
///
/// Relative paths are taken relative to the manifest, so a run behaves the
/// same from any working directory.
pub fn state_file_path(manifest: &Manifest, manifest_path: &Path) -> Option<PathBuf> {
    let state_file = manifest.settings.state_file.as_ref()?;
    if state_file.is_absolute() {
        return Some(state_file.clone());
    }
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    Some(base.join(state_file))
}
