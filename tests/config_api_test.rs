//! Integration tests for running manifests through the library API.

use operarius::cli::commands::LoadedManifest;
use operarius::config::{load_manifest, parse_manifest, validate_config, validate_manifest};
use operarius::logging::NullLogger;
use operarius::runner::{OnFailure, RunStatus};
use operarius::task::TaskStatus;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_manifest(temp: &TempDir, yaml: &str) -> PathBuf {
    let path = temp.path().join("operarius.yml");
    fs::write(&path, yaml).unwrap();
    path
}

const GUARDED: &str = r#"
settings:
  protected_contexts: [production]
  on_failure: skip-dependents
tasks:
  - id: db
    type: passthrough
    spec:
      protected: true
      name: main
  - id: cache
    type: passthrough
    spec:
      name: redis
  - id: app
    type: passthrough
    depends_on: [cache]
    dependencies:
      - tasks: [db]
        contexts: [staging]
    spec:
      cache: "${VAR:cache:name}"
  - id: seed
    type: passthrough
    scopes:
      - commands: [create]
        contexts: [staging]
"#;

#[test]
fn full_manifest_workflow() {
    let temp = TempDir::new().unwrap();
    let path = write_manifest(&temp, GUARDED);

    let manifest = load_manifest(&path).unwrap();
    validate_manifest(&manifest).unwrap();
    assert_eq!(manifest.settings.on_failure, OnFailure::SkipDependents);

    let loaded = LoadedManifest::load(&path).unwrap();
    let runner = loaded.runner(None).unwrap();
    let options = loaded
        .settings
        .run_options("create", "production")
        .with_logger(NullLogger);

    let result = runner.run(&loaded.tasks, &options).unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.status_of("db"), Some(TaskStatus::Skipped));
    assert_eq!(result.status_of("app"), Some(TaskStatus::Succeeded));
    assert!(result.record("seed").is_none());
    assert_eq!(
        result.record("app").unwrap().outputs["cache"],
        Value::from("redis")
    );
}

#[test]
fn conditional_dependency_applies_in_its_context() {
    let temp = TempDir::new().unwrap();
    let path = write_manifest(&temp, GUARDED);

    let loaded = LoadedManifest::load(&path).unwrap();
    let runner = loaded.runner(None).unwrap();
    let options = loaded.settings.run_options("create", "staging");
    let plan = runner.plan(&loaded.tasks, &options).unwrap();

    assert_eq!(plan.batches, vec![vec!["cache", "db", "seed"], vec!["app"]]);
}

#[test]
fn derived_ids_are_stable() {
    let yaml = "tasks:\n  - type: passthrough\n    spec: {name: a}\n";
    let first = parse_manifest(yaml, Path::new("a.yml"))
        .unwrap()
        .into_tasks()
        .unwrap();
    let second = parse_manifest(yaml, Path::new("b.yml"))
        .unwrap()
        .into_tasks()
        .unwrap();

    let ids = |set: &operarius::task::TaskSet| {
        set.iter().map(|t| t.id().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.len(), 1);
}

#[test]
fn invalid_manifest_collects_every_error() {
    let manifest = parse_manifest(
        r#"
settings:
  workers: 0
commands:
  ship: launch
tasks:
  - id: a
    type: passthrough
  - id: a
    type: passthrough
"#,
        Path::new("bad.yml"),
    )
    .unwrap();

    let rules: Vec<String> = validate_config(&manifest)
        .into_iter()
        .map(|e| e.rule)
        .collect();
    assert_eq!(rules, vec!["zero-workers", "unknown-action", "duplicate-id"]);
    assert!(validate_manifest(&manifest).is_err());
}
