//! A processor that applies nothing and echoes its spec.
//!
//! Useful for wiring values between tasks, for dry runs of a manifest and
//! in tests.

use serde_yaml::Value;

use super::{ProcessorResult, TaskProcessor};
use crate::task::{spec_checksum, ExecutionRecord, Outputs, Task};

/// Echoes the resolved spec back as outputs.
///
/// - `create` / `update` return the spec's top-level entries, or the whole
///   spec under `value` when it is not a mapping
/// - `describe` returns the last applied outputs with an `exists` flag
/// - `drift` compares the spec checksum with the applied one
/// - `delete` / `rollback` succeed without doing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

impl PassthroughProcessor {
    pub const TYPE: &'static str = "passthrough";

    fn echo(spec: &Value) -> Outputs {
        match spec {
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| (key_string(k), v.clone()))
                .collect(),
            Value::Null => Outputs::new(),
            other => {
                let mut outputs = Outputs::new();
                outputs.insert("value".to_string(), other.clone());
                outputs
            }
        }
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

impl TaskProcessor for PassthroughProcessor {
    fn create(&self, _task: &Task, spec: &Value) -> ProcessorResult<Outputs> {
        Ok(Self::echo(spec))
    }

    fn update(
        &self,
        _task: &Task,
        spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        Ok(Self::echo(spec))
    }

    fn delete(
        &self,
        _task: &Task,
        _spec: &Value,
        _prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<()> {
        Ok(())
    }

    fn describe(
        &self,
        _task: &Task,
        _spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<Outputs> {
        let applied = prior.and_then(|p| p.applied.as_ref());
        let mut outputs = applied.map(|a| a.outputs.clone()).unwrap_or_default();
        outputs.insert("exists".to_string(), Value::Bool(applied.is_some()));
        Ok(outputs)
    }

    fn drift(
        &self,
        _task: &Task,
        spec: &Value,
        prior: Option<&ExecutionRecord>,
    ) -> ProcessorResult<bool> {
        let applied = prior.and_then(|p| p.applied.as_ref());
        Ok(applied.map_or(true, |a| a.spec_checksum != spec_checksum(spec)))
    }

    fn rollback(
        &self,
        _task: &Task,
        _spec: &Value,
        _prior: Option<&ExecutionRecord>,
        _partial: &Outputs,
    ) -> ProcessorResult<()> {
        Ok(())
    }
}
