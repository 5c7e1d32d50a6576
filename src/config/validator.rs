//! Manifest validation rules.
//!
//! This module validates a manifest for correctness:
//! - Tasks must name a type
//! - Explicit ids must be non-empty and unique
//! - `workers` must be at least 1
//! - Custom commands must link to a known action

use std::collections::BTreeMap;

use crate::config::schema::Manifest;
use crate::error::{OperariusError, Result};
use crate::processor::Action;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Task id or position if error is task-specific
    pub task: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, task: Option<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            task,
        }
    }
}

/// Validate a manifest and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(manifest: &Manifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(manifest));
    errors.extend(validate_commands(manifest));
    errors.extend(validate_tasks(manifest));

    errors
}

fn validate_settings(manifest: &Manifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if manifest.settings.workers == 0 {
        errors.push(ValidationError::new(
            "zero-workers",
            "settings.workers must be at least 1".to_string(),
            None,
        ));
    }

    errors
}

fn validate_commands(manifest: &Manifest) -> Vec<ValidationError> {
    manifest
        .commands
        .iter()
        .filter(|(_, action)| Action::from_name(action).is_none())
        .map(|(command, action)| {
            ValidationError::new(
                "unknown-action",
                format!(
                    "Command '{}' is linked to unknown action '{}'",
                    command, action
                ),
                None,
            )
        })
        .collect()
}

fn validate_tasks(manifest: &Manifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();

    for (index, task) in manifest.tasks.iter().enumerate() {
        let label = task
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1));

        if task.task_type.trim().is_empty() {
            errors.push(ValidationError::new(
                "missing-type",
                format!("Task '{}' must have a 'type'", label),
                Some(label.clone()),
            ));
        }

        if let Some(id) = task.id.as_deref() {
            if id.trim().is_empty() {
                errors.push(ValidationError::new(
                    "empty-id",
                    format!("Task {} has an empty 'id'", label),
                    Some(label.clone()),
                ));
            } else if let Some(first) = seen.insert(id, index) {
                errors.push(ValidationError::new(
                    "duplicate-id",
                    format!(
                        "Task id '{}' is declared by entries #{} and #{}",
                        id,
                        first + 1,
                        index + 1
                    ),
                    Some(label.clone()),
                ));
            }
        }

        if task.depends_on.iter().any(|d| Some(d.as_str()) == task.id.as_deref()) {
            errors.push(ValidationError::new(
                "self-dependency",
                format!("Task '{}' depends on itself", label),
                Some(label),
            ));
        }
    }

    errors
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    let errors = validate_config(manifest);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(OperariusError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Manifest {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn rules(manifest: &Manifest) -> Vec<String> {
        validate_config(manifest).into_iter().map(|e| e.rule).collect()
    }

    #[test]
    fn valid_manifest_passes() {
        let manifest = parse(
            "commands:\n  apply: create\ntasks:\n  - {id: a, type: passthrough}\n  - {id: b, type: shell, depends_on: [a]}\n",
        );
        assert!(validate_manifest(&manifest).is_ok());
    }

    #[test]
    fn reports_missing_type() {
        let manifest = parse("tasks:\n  - id: a\n");
        assert_eq!(rules(&manifest), vec!["missing-type"]);
    }

    #[test]
    fn reports_zero_workers() {
        let manifest = parse("settings:\n  workers: 0\n");
        assert_eq!(rules(&manifest), vec!["zero-workers"]);
    }

    #[test]
    fn reports_unknown_action() {
        let manifest = parse("commands:\n  launch: fire\n");
        let errors = validate_config(&manifest);
        assert_eq!(errors[0].rule, "unknown-action");
        assert!(errors[0].message.contains("'fire'"));
    }

    #[test]
    fn reports_duplicate_and_self_dependency() {
        let manifest = parse(
            "tasks:\n  - {id: a, type: t}\n  - {id: a, type: t}\n  - {id: b, type: t, depends_on: [b]}\n",
        );
        assert_eq!(rules(&manifest), vec!["duplicate-id", "self-dependency"]);
    }

    #[test]
    fn aggregates_every_message() {
        let manifest = parse("settings:\n  workers: 0\ntasks:\n  - {id: ''}\n");
        let err = validate_manifest(&manifest).unwrap_err().to_string();
        assert!(err.contains("workers"));
        assert!(err.contains("'type'"));
        assert!(err.contains("empty 'id'"));
    }
}
