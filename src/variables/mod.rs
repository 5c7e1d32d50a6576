//! Cross-task variable references.
//!
//! A task may use outputs of the tasks it depends on inside its spec.
//! This module handles all aspects of that:
//! - Reference grammar in [`reference`]
//! - The append-only Resolved Variable Set in [`store`]
//! - Pure spec resolution in [`resolver`]
//!
//! # Example
//!
//! ```
//! use operarius::task::{Outputs, Task};
//! use operarius::variables::{resolve_task, ResolvedVariables};
//!
//! let mut outputs = Outputs::new();
//! outputs.insert("path".into(), "/tmp/x".into());
//!
//! let mut vars = ResolvedVariables::new();
//! vars.record("A", &outputs);
//!
//! let spec = serde_yaml::from_str("source: ${VAR:A:path}/in.csv").unwrap();
//! let task = Task::new("B", "file", spec).depends_on(["A"]);
//! let resolved = resolve_task(&task, &vars).unwrap();
//! assert_eq!(resolved["source"], "/tmp/x/in.csv");
//! ```

pub mod reference;
pub mod resolver;
pub mod store;

pub use reference::{extract_references, has_references, parse_references, Segment, VariableRef};
pub use resolver::{
    references_in, resolve_spec, resolve_task, undeclared_references, ResolutionError,
};
pub use store::ResolvedVariables;
