//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::task::DEFAULT_CONTEXT;

/// Operarius - Dependency-ordered task workflows.
#[derive(Debug, Parser)]
#[command(name = "operarius")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a command over every active task in a manifest
    Run(RunArgs),

    /// Show the batches a run would process, without running anything
    Plan(PlanArgs),

    /// Validate a manifest, its dependency graph and its task types
    Validate(ValidateArgs),

    /// Show persisted execution records
    State(StateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Path to the manifest
    pub manifest: PathBuf,

    /// Command to run (create, update, delete, describe, drift, rollback or a
    /// manifest alias)
    #[arg(long, default_value = "create")]
    pub command: String,

    /// Context to run in
    #[arg(long, default_value = DEFAULT_CONTEXT)]
    pub context: String,

    /// Worker threads per batch (overrides settings.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// State file (overrides settings.state_file)
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, clap::Args)]
pub struct PlanArgs {
    /// Path to the manifest
    pub manifest: PathBuf,

    /// Command to plan for
    #[arg(long, default_value = "create")]
    pub command: String,

    /// Context to plan for
    #[arg(long, default_value = DEFAULT_CONTEXT)]
    pub context: String,

    /// State file (overrides settings.state_file)
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    /// Path to the manifest
    pub manifest: PathBuf,

    /// Command to validate the graph for
    #[arg(long, default_value = "create")]
    pub command: String,

    /// Context to validate the graph for
    #[arg(long, default_value = DEFAULT_CONTEXT)]
    pub context: String,
}

/// Arguments for the `state` command.
#[derive(Debug, Clone, clap::Args)]
pub struct StateArgs {
    /// Path to the state file
    pub file: PathBuf,

    /// Show the full record of one task
    #[arg(long, value_name = "ID")]
    pub task: Option<String>,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
