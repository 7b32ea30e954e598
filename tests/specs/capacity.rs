// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capacity specs: `max_size` bounds the pool; overflow claims fail
//! with a capacity error and never leak rows.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn fourth_claim_fails_at_capacity_three() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 3, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;

    for name in ["t1", "t2", "t3"] {
        harness.pipeline.claim(&pool, &tenant(name)).await.unwrap();
    }
    let err = harness.pipeline.claim(&pool, &tenant("t4")).await.unwrap_err();
    assert!(matches!(err, PoolError::PoolCapacity { max_size: 3, .. }), "{err:?}");

    let stats = pool.stats().await.unwrap();
    assert_eq!(stats.borrowed, 3);
    assert_eq!(stats.total, 3);
}

#[tokio::test]
async fn capacity_frees_up_after_release() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 2, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;

    harness.pipeline.claim(&pool, &tenant("t1")).await.unwrap();
    harness.pipeline.claim(&pool, &tenant("t2")).await.unwrap();
    assert!(harness.pipeline.claim(&pool, &tenant("t3")).await.is_err());

    harness.pipeline.release(&pool, &tenant("t1"), ReleaseOptions::default()).await.unwrap();
    harness.pipeline.claim(&pool, &tenant("t3")).await.unwrap();
    assert_eq!(pool.stats().await.unwrap().total, 2);
}

#[tokio::test]
async fn reclaim_by_holder_does_not_consume_capacity() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 1, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let first = harness.pipeline.claim(&pool, &t1).await.unwrap();
    let again = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert_eq!(first.container.container_id, again.container.container_id);
    assert!(again.affinity);
    assert_eq!(pool.stats().await.unwrap().total, 1);
}
