//! Hook pipeline around processor dispatch.
//!
//! A [`HookChain`] is an ordered list of [`Hook`]s. Each hook receives the
//! call and a [`Next`] continuation. It may do work around `next.run(call)`
//! or return without calling it to short-circuit the chain. After the last
//! hook, `Next` dispatches to the processor method the run's action names.
//!
//! A hook added with [`HookChain::with_scoped`] only sees calls whose
//! command and context its [`ProcessingScope`] admits; other calls pass
//! straight to the next hook.
//!
//! ```
//! use operarius::hooks::{Hook, HookCall, HookChain, HookOutcome, Next};
//! use operarius::processor::ProcessorError;
//!
//! struct Audit;
//!
//! impl Hook for Audit {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     fn invoke(&self, call: &HookCall<'_>, next: Next<'_>) -> Result<HookOutcome, ProcessorError> {
//!         let outcome = next.run(call);
//!         eprintln!("{} finished {}", call.task.id(), call.action);
//!         outcome
//!     }
//! }
//!
//! let chain = HookChain::new().with(Audit);
//! assert_eq!(chain.names(), vec!["audit"]);
//! ```

pub mod builtin;

pub use builtin::{ContextGuard, LoggingHook, UnchangedSpecGuard};

use serde_yaml::Value;
use std::sync::Arc;

use crate::logging::RunLogger;
use crate::processor::{self, Action, ProcessorError, TaskProcessor};
use crate::task::{Context, ExecutionRecord, Outputs, ProcessingScope, Task};

/// Everything a hook knows about the dispatch in progress.
pub struct HookCall<'a> {
    pub task: &'a Task,
    /// The fully resolved spec.
    pub spec: &'a Value,
    /// The run command, e.g. `apply`.
    pub command: &'a str,
    /// The action the command is linked to.
    pub action: Action,
    pub context: &'a Context,
    pub processor: &'a dyn TaskProcessor,
    /// The task's persisted record from earlier runs.
    pub prior: Option<&'a ExecutionRecord>,
    pub logger: &'a dyn RunLogger,
}

/// How a chain ended.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// The task completed with these outputs, from the processor or a hook.
    Completed(Outputs),
    /// A hook refused to let the task run.
    Blocked { hook: String, reason: String },
}

impl HookOutcome {
    pub fn blocked(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Blocked {
            hook: hook.into(),
            reason: reason.into(),
        }
    }
}

/// A stage in the hook chain.
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    /// Handle the call, normally by returning `next.run(call)`.
    fn invoke(&self, call: &HookCall<'_>, next: Next<'_>) -> Result<HookOutcome, ProcessorError>;
}

#[derive(Clone)]
struct ChainEntry {
    hook: Arc<dyn Hook>,
    scope: Option<ProcessingScope>,
}

impl ChainEntry {
    fn applies_to(&self, call: &HookCall<'_>) -> bool {
        self.scope.as_ref().map_or(true, |scope| {
            ProcessingScope::admits(std::slice::from_ref(scope), call.command, call.context)
        })
    }
}

/// Continuation over the hooks that have not run yet.
pub struct Next<'a> {
    remaining: &'a [ChainEntry],
}

impl Next<'_> {
    /// Run the rest of the chain, ending in processor dispatch.
    pub fn run(self, call: &HookCall<'_>) -> Result<HookOutcome, ProcessorError> {
        let mut remaining = self.remaining;
        while let Some((entry, rest)) = remaining.split_first() {
            if entry.applies_to(call) {
                return entry.hook.invoke(call, Next { remaining: rest });
            }
            remaining = rest;
        }
        dispatch(call)
    }
}

fn dispatch(call: &HookCall<'_>) -> Result<HookOutcome, ProcessorError> {
    processor::invoke(call.processor, call.action, call.task, call.spec, call.prior)
        .map(HookOutcome::Completed)
}

/// Ordered hooks applied to every task of a run.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<ChainEntry>,
}

impl HookChain {
    /// An empty chain: every call goes straight to the processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook.
    pub fn with(mut self, hook: impl Hook + 'static) -> Self {
        self.push(hook);
        self
    }

    /// Append a hook that only runs for commands and contexts `scope` admits.
    pub fn with_scoped(mut self, hook: impl Hook + 'static, scope: ProcessingScope) -> Self {
        self.push_scoped(hook, scope);
        self
    }

    pub fn push(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(ChainEntry {
            hook: Arc::new(hook),
            scope: None,
        });
    }

    pub fn push_scoped(&mut self, hook: impl Hook + 'static, scope: ProcessingScope) {
        self.hooks.push(ChainEntry {
            hook: Arc::new(hook),
            scope: Some(scope),
        });
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|e| e.hook.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the chain for one call.
    pub fn run(&self, call: &HookCall<'_>) -> Result<HookOutcome, ProcessorError> {
        Next {
            remaining: &self.hooks,
        }
        .run(call)
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.names())
            .finish()
    }
}
