//! Task execution orchestration.
//!
//! - [`DependencyGraph`] - Validates dependencies and computes batches
//! - [`WorkflowRunner`] - Runs batches through hooks and processors
//! - [`RunResult`] - Per-task records and the overall status

pub mod dependency;
pub mod pool;
pub mod result;
pub mod workflow;

pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use result::{RunResult, RunStatus};
pub use workflow::{OnFailure, RollbackPolicy, RunOptions, RunPlan, WorkflowRunner};
