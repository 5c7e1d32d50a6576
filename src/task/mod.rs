//! Task model.
//!
//! - [`Task`] - A declared unit of work with a type, spec and dependencies
//! - [`TaskSet`] - The tasks of a run, keyed by unique id
//! - [`Context`] - The named environment a run processes
//! - [`TaskStatus`] - Per-task state machine
//! - [`ExecutionRecord`] - Per-task outcome, persisted at every transition

pub mod model;
pub mod record;
pub mod status;

pub use model::{
    spec_checksum, ConditionalDependency, Context, LabelSelector, ProcessingScope, ScopeMode, Task,
    TaskSet, DEFAULT_CONTEXT,
};
pub use record::{
    AppliedState, ExecutionRecord, FailureKind, Outputs, ProcessingEvent, TaskFailure,
};
pub use status::TaskStatus;
