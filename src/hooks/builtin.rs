//! Hooks shipped with the crate.

use serde_yaml::Value;
use std::collections::BTreeSet;

use super::{Hook, HookCall, HookOutcome, Next};
use crate::logging::RunEvent;
use crate::processor::{Action, ProcessorError};
use crate::task::spec_checksum;

/// Reports every dispatch and its result to the run logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn invoke(&self, call: &HookCall<'_>, next: Next<'_>) -> Result<HookOutcome, ProcessorError> {
        let task = call.task.id();
        call.logger.log(&RunEvent::Dispatch {
            task,
            action: call.action,
        });

        let outcome = next.run(call);
        let message = outcome.as_ref().err().map(|e| e.to_string());
        call.logger.log(&RunEvent::DispatchFinished {
            task,
            action: call.action,
            error: message.as_deref(),
        });
        outcome
    }
}

/// Skips an `update` whose resolved spec matches the last applied one.
///
/// The applied outputs are returned as the task's outputs, so dependents
/// still resolve their references.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnchangedSpecGuard;

impl Hook for UnchangedSpecGuard {
    fn name(&self) -> &str {
        "unchanged-spec"
    }

    fn invoke(&self, call: &HookCall<'_>, next: Next<'_>) -> Result<HookOutcome, ProcessorError> {
        if call.action != Action::Update {
            return next.run(call);
        }

        let applied = call.prior.and_then(|p| p.applied.as_ref());
        match applied {
            Some(applied) if applied.spec_checksum == spec_checksum(call.spec) => {
                call.logger.log(&RunEvent::HookShortCircuit {
                    task: call.task.id(),
                    hook: self.name(),
                    reason: "spec unchanged since last apply",
                });
                Ok(HookOutcome::Completed(applied.outputs.clone()))
            }
            _ => next.run(call),
        }
    }
}

/// Blocks tasks marked `protected: true` in protected contexts.
#[derive(Debug, Clone, Default)]
pub struct ContextGuard {
    protected: BTreeSet<String>,
}

impl ContextGuard {
    /// Spec key that marks a task as protected.
    pub const PROTECTED_KEY: &'static str = "protected";

    pub fn new<I, S>(contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: contexts.into_iter().map(Into::into).collect(),
        }
    }

    fn is_protected(spec: &Value) -> bool {
        spec.get(Self::PROTECTED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Hook for ContextGuard {
    fn name(&self) -> &str {
        "context-guard"
    }

    fn invoke(&self, call: &HookCall<'_>, next: Next<'_>) -> Result<HookOutcome, ProcessorError> {
        let context = call.context.name();
        if !self.protected.contains(context) || !Self::is_protected(call.spec) {
            return next.run(call);
        }

        let reason = format!(
            "task is protected in context '{}', refusing to {}",
            context, call.command
        );
        call.logger.log(&RunEvent::HookShortCircuit {
            task: call.task.id(),
            hook: self.name(),
            reason: &reason,
        });
        Ok(HookOutcome::blocked(self.name(), reason))
    }
}
