// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::WorkloadSpec;

const MINIMAL_YAML: &str = r#"
id: web
image: nginx:alpine
health_check:
  test: ["CMD", "curl", "-f", "http://localhost/"]
"#;

const FULL_YAML: &str = r#"
id: notebooks
image: jupyter/base:latest
user: "1000"
health_check:
  test: ["CMD-SHELL", "curl -fs http://localhost:8888/api || exit 1"]
pool:
  min_idle: 2
  max_size: 8
sync:
  sink:
    type: s3
    bucket: tenant-state
    prefix: notebooks/${tenantId}
  mappings:
    - container_path: work
      sink_path: work
      direction: bisync
  policy:
    interval_ms: 60000
hooks:
  post_claim:
    - command: ["sh", "-c", "echo ready"]
  pre_release:
    - command: ["sh", "-c", "sync"]
      on_error: continue
"#;

fn minimal() -> WorkloadSpec {
    serde_yaml::from_str(MINIMAL_YAML).unwrap()
}

fn full() -> WorkloadSpec {
    serde_yaml::from_str(FULL_YAML).unwrap()
}

fn issue_paths(err: &ValidationError) -> Vec<&str> {
    err.issues.iter().map(|i| i.path.as_str()).collect()
}

#[test]
fn valid_specs_pass() {
    validate(&minimal()).unwrap();
    validate(&full()).unwrap();
}

#[test]
fn empty_id_and_image_both_reported() {
    let mut spec = minimal();
    spec.id = String::new();
    spec.image = String::new();
    let err = validate(&spec).unwrap_err();
    assert_eq!(issue_paths(&err), vec!["id", "image"]);
}

#[test]
fn min_idle_above_max_size() {
    let mut spec = minimal();
    spec.pool = Some(crate::PoolDefaults {
        min_idle: 5,
        max_size: 3,
        ..Default::default()
    });
    let err = validate(&spec).unwrap_err();
    assert_eq!(issue_paths(&err), vec!["pool.min_idle"]);
}

#[test]
fn mapping_paths_checked_with_indices() {
    let mut spec = full();
    let sync = spec.sync.as_mut().unwrap();
    sync.policy.interval_ms = None;
    sync.mappings.push(crate::SyncMapping {
        container_path: "/absolute".into(),
        sink_path: "../escape".into(),
        direction: crate::MappingDirection::Upload,
    });
    let err = validate(&spec).unwrap_err();
    assert_eq!(
        issue_paths(&err),
        vec!["sync.mappings[1].container_path", "sync.mappings[1].sink_path"]
    );
}

#[test]
fn download_mapping_conflicts_with_interval() {
    let mut spec = full();
    spec.sync.as_mut().unwrap().mappings[0].direction = crate::MappingDirection::Download;
    let err = validate(&spec).unwrap_err();
    assert_eq!(issue_paths(&err), vec!["sync.mappings[0].direction"]);
}

#[test]
fn hook_with_empty_argv() {
    let mut spec = full();
    spec.hooks.as_mut().unwrap().post_claim[0].command.clear();
    let err = validate(&spec).unwrap_err();
    assert_eq!(issue_paths(&err), vec!["hooks.post_claim[0].command"]);
}

#[test]
fn zero_retries_rejected() {
    let mut spec = full();
    spec.hooks.as_mut().unwrap().pre_release[0].retries = 0;
    let err = validate(&spec).unwrap_err();
    assert_eq!(issue_paths(&err), vec!["hooks.pre_release[0].retries"]);
}

#[test]
fn error_display_includes_workload_and_paths() {
    let mut spec = minimal();
    spec.image = String::new();
    let err = validate(&spec).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("\"web\""), "{text}");
    assert!(text.contains("image"), "{text}");
}
