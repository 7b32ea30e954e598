// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wipe-on-entry specs: a foreign tenant never sees prior state.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn foreign_tenant_gets_empty_state() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 1, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");
    let t2 = tenant("t2");

    let first = harness.pipeline.claim(&pool, &t1).await.unwrap();
    let id = first.container.container_id;
    let state = harness.state_dir(&id);
    std::fs::write(state.join("secret.txt"), "t1 private").unwrap();
    harness.pipeline.release(&pool, &t1, ReleaseOptions::default()).await.unwrap();

    // max_size = 1 forces reuse of the same container.
    let second = harness.pipeline.claim(&pool, &t2).await.unwrap();
    assert_eq!(second.container.container_id, id);

    let entries: Vec<_> = std::fs::read_dir(&state)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(entries.is_empty(), "stale state visible to foreign tenant: {entries:?}");
}

#[tokio::test]
async fn wipe_reapplies_seeds() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    std::fs::write(seed.join("base.cfg"), "defaults").unwrap();

    let yaml = Harness::workload_yaml(
        0,
        1,
        &format!("volumes:\n  state:\n    seed: {}\n", seed.display()),
    );
    let harness = Harness::with_workload(&yaml, Duration::from_secs(5)).await;
    let pool = harness.pool().await;

    let first = harness.pipeline.claim(&pool, &tenant("t1")).await.unwrap();
    let state = harness.state_dir(&first.container.container_id);
    assert_eq!(std::fs::read_to_string(state.join("base.cfg")).unwrap(), "defaults");
    std::fs::write(state.join("scratch.txt"), "junk").unwrap();
    harness.pipeline.release(&pool, &tenant("t1"), ReleaseOptions::default()).await.unwrap();

    harness.pipeline.claim(&pool, &tenant("t2")).await.unwrap();
    assert!(!state.join("scratch.txt").exists());
    assert_eq!(std::fs::read_to_string(state.join("base.cfg")).unwrap(), "defaults");
}
