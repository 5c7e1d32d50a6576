//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Reports are written to the
//! writer passed to [`Command::execute`]; logs go to stderr.

pub mod completions;
pub mod dispatcher;
pub mod plan;
pub mod run;
pub mod setup;
pub mod state;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use plan::render_plan;
pub use run::ProgressLogger;
pub use setup::{builtin_registry, LoadedManifest};
