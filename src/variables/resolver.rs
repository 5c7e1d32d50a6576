//! Spec resolution against the Resolved Variable Set.
//!
//! Resolution is pure: it reads the set and returns a new spec. A task
//! either gets a fully resolved spec or an error, never a partial one.

use serde_yaml::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use super::reference::{extract_references, parse_references, Segment, VariableRef};
use super::store::ResolvedVariables;
use crate::task::{FailureKind, Task, TaskFailure};

/// Why a task spec could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The spec references a task that is not a declared dependency.
    #[error("task '{task}' references {reference} but does not depend on '{producer}'")]
    UndeclaredDependencyReference {
        task: String,
        producer: String,
        reference: String,
    },

    /// The producer has not emitted the referenced output.
    #[error("task '{task}' references {reference} but '{producer}' has no output '{key}'")]
    UnresolvedReference {
        task: String,
        producer: String,
        key: String,
        reference: String,
    },
}

impl From<ResolutionError> for TaskFailure {
    fn from(err: ResolutionError) -> Self {
        let kind = match &err {
            ResolutionError::UndeclaredDependencyReference { .. } => {
                FailureKind::UndeclaredDependencyReference
            }
            ResolutionError::UnresolvedReference { .. } => FailureKind::UnresolvedReference,
        };
        TaskFailure::new(kind, err.to_string())
    }
}

/// Resolve every reference in a task's spec using its declared dependencies.
pub fn resolve_task(task: &Task, vars: &ResolvedVariables) -> Result<Value, ResolutionError> {
    resolve_spec(task.id(), task.spec(), task.dependencies(), vars)
}

/// Resolve every reference in `spec`.
///
/// References are only allowed to tasks in `declared`; that check runs
/// before any lookup, so an undeclared reference fails even when the
/// output exists. Mapping keys are never rewritten.
pub fn resolve_spec(
    task_id: &str,
    spec: &Value,
    declared: &BTreeSet<String>,
    vars: &ResolvedVariables,
) -> Result<Value, ResolutionError> {
    let resolver = Resolver {
        task_id,
        declared,
        vars,
    };
    resolver.value(spec)
}

/// Collect every reference inside a spec, recursively.
pub fn references_in(spec: &Value) -> BTreeSet<VariableRef> {
    let mut refs = BTreeSet::new();
    collect(spec, &mut refs);
    refs
}

fn collect(value: &Value, refs: &mut BTreeSet<VariableRef>) {
    match value {
        Value::String(s) => refs.extend(extract_references(s)),
        Value::Sequence(seq) => seq.iter().for_each(|v| collect(v, refs)),
        Value::Mapping(map) => map.iter().for_each(|(_, v)| collect(v, refs)),
        Value::Tagged(tagged) => collect(&tagged.value, refs),
        _ => {}
    }
}

/// References in a task's spec whose producer is not a declared dependency.
pub fn undeclared_references(spec: &Value, declared: &BTreeSet<String>) -> Vec<VariableRef> {
    references_in(spec)
        .into_iter()
        .filter(|r| !declared.contains(&r.task))
        .collect()
}

struct Resolver<'a> {
    task_id: &'a str,
    declared: &'a BTreeSet<String>,
    vars: &'a ResolvedVariables,
}

impl Resolver<'_> {
    fn value(&self, value: &Value) -> Result<Value, ResolutionError> {
        match value {
            Value::String(s) => self.string(s),
            Value::Sequence(seq) => seq
                .iter()
                .map(|v| self.value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut resolved = serde_yaml::Mapping::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k.clone(), self.value(v)?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Tagged(tagged) => {
                let mut tagged = tagged.as_ref().clone();
                tagged.value = self.value(&tagged.value)?;
                Ok(Value::Tagged(Box::new(tagged)))
            }
            other => Ok(other.clone()),
        }
    }

    fn string(&self, input: &str) -> Result<Value, ResolutionError> {
        let segments = parse_references(input);

        // A string that is exactly one reference takes the referenced
        // value as-is, keeping its type.
        if let [Segment::Reference(r)] = segments.as_slice() {
            return self.lookup(r).cloned();
        }

        let mut result = String::new();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Reference(r) => result.push_str(&render(self.lookup(r)?)),
            }
        }
        Ok(Value::String(result))
    }

    fn lookup(&self, r: &VariableRef) -> Result<&Value, ResolutionError> {
        if !self.declared.contains(&r.task) {
            return Err(ResolutionError::UndeclaredDependencyReference {
                task: self.task_id.to_string(),
                producer: r.task.clone(),
                reference: r.to_string(),
            });
        }

        self.vars
            .get(&r.task, &r.key)
            .ok_or_else(|| ResolutionError::UnresolvedReference {
                task: self.task_id.to_string(),
                producer: r.task.clone(),
                key: r.key.clone(),
                reference: r.to_string(),
            })
    }
}

/// Render a value for embedding inside a larger string.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => render(&tagged.value),
        complex => serde_json::to_string(complex).unwrap_or_else(|_| {
            serde_yaml::to_string(complex)
                .unwrap_or_default()
                .trim_end()
                .to_string()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Outputs;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn deps(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn vars_with(task: &str, outputs: &str) -> ResolvedVariables {
        let mut vars = ResolvedVariables::new();
        let outputs: Outputs = serde_yaml::from_str(outputs).unwrap();
        vars.record(task, &outputs);
        vars
    }

    #[test]
    fn resolves_embedded_reference() {
        let vars = vars_with("A", "path: /tmp/x");
        let spec = yaml("source: \"${VAR:A:path}/data.csv\"");
        let resolved = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        assert_eq!(resolved, yaml("source: /tmp/x/data.csv"));
    }

    #[test]
    fn whole_string_reference_keeps_type() {
        let vars = vars_with("db", "port: 5432\nendpoint: {host: h, port: 1}");
        let spec = yaml("port: \"${VAR:db:port}\"\nendpoint: \"${VAR:db:endpoint}\"");
        let resolved = resolve_spec("app", &spec, &deps(&["db"]), &vars).unwrap();
        assert_eq!(resolved["port"], Value::from(5432));
        assert_eq!(resolved["endpoint"]["host"], Value::from("h"));
    }

    #[test]
    fn resolves_through_sequences_and_nested_mappings() {
        let vars = vars_with("A", "name: alpha");
        let spec = yaml(
            r#"
            items:
              - "${VAR:A:name}-1"
              - nested:
                  label: "x-${VAR:A:name}"
            count: 3
            "#,
        );
        let resolved = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        assert_eq!(resolved["items"][0], Value::from("alpha-1"));
        assert_eq!(resolved["items"][1]["nested"]["label"], Value::from("x-alpha"));
        assert_eq!(resolved["count"], Value::from(3));
    }

    #[test]
    fn embedded_complex_value_renders_as_json() {
        let vars = vars_with("A", "tags: [a, b]");
        let spec = yaml("arg: \"--tags=${VAR:A:tags}\"");
        let resolved = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        assert_eq!(resolved["arg"], Value::from("--tags=[\"a\",\"b\"]"));
    }

    #[test]
    fn undeclared_reference_fails_even_when_output_exists() {
        let vars = vars_with("A", "path: /tmp/x");
        let spec = yaml("source: \"${VAR:A:path}\"");
        let err = resolve_spec("B", &spec, &deps(&[]), &vars).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::UndeclaredDependencyReference { ref producer, .. } if producer == "A"
        ));
    }

    #[test]
    fn missing_output_is_unresolved() {
        let vars = vars_with("A", "path: /tmp/x");
        let spec = yaml("size: \"${VAR:A:size}\"");
        let err = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::UnresolvedReference { ref key, .. } if key == "size"
        ));
    }

    #[test]
    fn producer_that_never_ran_is_unresolved() {
        let spec = yaml("size: \"${VAR:A:size}\"");
        let err = resolve_spec("B", &spec, &deps(&["A"]), &ResolvedVariables::new()).unwrap_err();
        assert!(matches!(err, ResolutionError::UnresolvedReference { .. }));
    }

    #[test]
    fn resolution_is_idempotent() {
        let vars = vars_with("A", "path: /tmp/x\nn: 2");
        let spec = yaml("a: \"${VAR:A:path}\"\nb: [\"${VAR:A:n}\", lit]");
        let first = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        let second = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mapping_keys_are_not_rewritten() {
        let vars = vars_with("A", "k: v");
        let spec = yaml("\"${VAR:A:k}\": literal");
        let resolved = resolve_spec("B", &spec, &deps(&["A"]), &vars).unwrap();
        assert_eq!(resolved, spec);
    }

    #[test]
    fn resolve_task_uses_declared_dependencies() {
        let vars = vars_with("A", "path: /tmp/x");
        let task = Task::new("B", "file", yaml("p: \"${VAR:A:path}\"")).depends_on(["A"]);
        assert_eq!(resolve_task(&task, &vars).unwrap()["p"], Value::from("/tmp/x"));
    }

    #[test]
    fn failure_conversion_keeps_kind() {
        let err = ResolutionError::UnresolvedReference {
            task: "B".into(),
            producer: "A".into(),
            key: "k".into(),
            reference: "${VAR:A:k}".into(),
        };
        let failure: TaskFailure = err.into();
        assert_eq!(failure.kind, FailureKind::UnresolvedReference);
        assert!(failure.message.contains("${VAR:A:k}"));
    }

    #[test]
    fn undeclared_references_lists_offenders() {
        let spec = yaml("a: \"${VAR:x:1} ${VAR:y:2}\"");
        let refs = undeclared_references(&spec, &deps(&["x"]));
        assert_eq!(refs, vec![VariableRef::new("y", "2")]);
    }
}
