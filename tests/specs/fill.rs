// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fill loop specs: pools converge to `min(min_idle, max_size)` idle
//! containers without any acquire traffic.

use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn pool_warms_to_min_idle() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(2, 5, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;

    // The registry started the fill loop; first tick is immediate.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = pool.stats().await.unwrap();
    assert_eq!(stats.idle, 2);
    assert_eq!(stats.total, 2);
    assert_eq!(harness.driver.container_names().len(), 2);
}

#[tokio::test]
async fn warm_capacity_never_exceeds_max_size() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(2, 2, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.stats().await.unwrap().total, 2);

    // Repeated fill passes stay put.
    pool.fill_once().await.unwrap();
    assert_eq!(pool.stats().await.unwrap().total, 2);
}

#[tokio::test]
async fn fill_replaces_claimed_capacity_when_available() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(1, 3, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Claim the only idle container; the next tick warms a fresh one.
    harness.pipeline.claim(&pool, &tenant("t1")).await.unwrap();
    pool.fill_once().await.unwrap();
    let stats = pool.stats().await.unwrap();
    assert_eq!(stats.borrowed, 1);
    assert_eq!(stats.idle, 1);
}
