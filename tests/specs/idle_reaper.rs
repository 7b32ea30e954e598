// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle reaper specs: file-idle TTL auto-releases a claimed container;
//! fresh writes defer the release.

use std::time::Duration;

use crate::prelude::*;

fn yaml(ttl_ms: u64) -> String {
    Harness::workload_yaml(0, 3, &format!("  file_idle_ttl_ms: {ttl_ms}\n"))
}

#[tokio::test]
async fn silence_releases_exactly_once() {
    let harness = Harness::with_workload(&yaml(200), Duration::from_millis(50)).await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let outcome = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert!(harness.reaper.is_watching(&outcome.container.container_id));

    // No writes: the claim is auto-released shortly after the TTL.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(pool.claimed(&t1).await.unwrap().is_none(), "claim not auto-released");
    assert!(!harness.reaper.is_watching(&outcome.container.container_id));

    let expiries = harness
        .activity
        .recent(&hearth_store::ActivityFilter {
            limit: 100,
            kind: Some(ActivityKind::ContainerExpired),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(expiries.len(), 1, "expiry fired more than once");
}

#[tokio::test]
async fn writes_defer_release() {
    let harness = Harness::with_workload(&yaml(300), Duration::from_millis(50)).await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let outcome = harness.pipeline.claim(&pool, &t1).await.unwrap();
    let state = harness.state_dir(&outcome.container.container_id);

    // Write every 100ms for 400ms: the TTL clock keeps resetting.
    for i in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(state.join("activity.txt"), format!("write {i}")).unwrap();
        assert!(
            pool.claimed(&t1).await.unwrap().is_some(),
            "released while the tenant was writing"
        );
    }

    // Go silent; now the release happens.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(pool.claimed(&t1).await.unwrap().is_none());
}

#[tokio::test]
async fn released_container_is_reusable_after_expiry() {
    let harness = Harness::with_workload(&yaml(150), Duration::from_millis(40)).await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let first = harness.pipeline.claim(&pool, &t1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(pool.claimed(&t1).await.unwrap().is_none());

    // The tenant can come back; affinity still applies.
    let again = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert_eq!(again.container.container_id, first.container.container_id);
    assert!(again.affinity);
}
