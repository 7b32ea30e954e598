// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Affinity specs: release-then-reacquire returns the same container
//! with its state intact.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn release_then_reacquire_keeps_state() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 3, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let first = harness.pipeline.claim(&pool, &t1).await.unwrap();
    let id = first.container.container_id;
    assert!(!first.affinity);

    // Tenant writes state.
    let state = harness.state_dir(&id);
    std::fs::write(state.join("data.txt"), "hello").unwrap();

    harness.pipeline.release(&pool, &t1, ReleaseOptions::default()).await.unwrap();

    // Same tenant reacquires: same container, no wipe.
    let second = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert_eq!(second.container.container_id, id);
    assert!(second.affinity);
    assert_eq!(std::fs::read_to_string(state.join("data.txt")).unwrap(), "hello");
}

#[tokio::test]
async fn affinity_only_applies_without_interference() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 3, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");
    let t2 = tenant("t2");

    let first = harness.pipeline.claim(&pool, &t1).await.unwrap();
    harness.pipeline.release(&pool, &t1, ReleaseOptions::default()).await.unwrap();

    // A foreign tenant takes the container in between.
    let stolen = harness.pipeline.claim(&pool, &t2).await.unwrap();
    assert_eq!(stolen.container.container_id, first.container.container_id);

    // The original tenant now gets a different (fresh) container.
    let third = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert_ne!(third.container.container_id, first.container.container_id);
    assert!(!third.affinity);
}

#[tokio::test]
async fn hostname_matches_runtime_name() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 2, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let outcome = harness.pipeline.claim(&pool, &tenant("t1")).await.unwrap();
    assert_eq!(
        outcome.hostname,
        format!("container-{}", outcome.container.container_id)
    );
    assert!(harness.driver.container_names().contains(&outcome.hostname));
}
