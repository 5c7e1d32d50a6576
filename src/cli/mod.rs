//! Command-line interface for Operarius.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations
//! - [`theme`] - Terminal styles for reports

pub mod args;
pub mod commands;
pub mod theme;

pub use args::{Cli, Commands, PlanArgs, RunArgs, StateArgs, ValidateArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
pub use theme::Theme;
