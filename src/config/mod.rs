//! Manifest loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use operarius::config::{load_manifest, validate_manifest};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("manifest.yml");
//! fs::write(&path, "tasks:\n  - id: a\n    type: passthrough\n").unwrap();
//!
//! let manifest = load_manifest(&path).unwrap();
//! validate_manifest(&manifest).unwrap();
//! let tasks = manifest.into_tasks().unwrap();
//! assert!(tasks.contains("a"));
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_manifest, parse_manifest, state_file_path};
pub use schema::{Manifest, Settings, TaskConfig};
pub use validator::{validate_config, validate_manifest, ValidationError};
