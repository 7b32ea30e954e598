// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery specs: after a restart the store and the runtime converge
//! and reaper watches come back for claimed rows.

use std::time::Duration;

use crate::prelude::*;
use hearth_pool::reconcile;
use hearth_runtime::{labels, RuntimeDriver};

fn managed_labels(container_id: &str) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    map.insert(labels::MANAGED.to_string(), "true".to_string());
    map.insert(labels::CONTAINER_ID.to_string(), container_id.to_string());
    map
}

#[tokio::test]
async fn restart_converges_store_and_runtime() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 3, ""),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    // Pre-shutdown state: one claimed, one idle.
    let claimed = harness.pipeline.claim(&pool, &t1).await.unwrap();
    pool.scale_to(2).await.unwrap();
    pool.stop();

    // While "down": the claimed container stopped, and a foreign
    // managed container appeared.
    harness
        .driver
        .stop_container(&claimed.hostname)
        .await
        .unwrap();
    harness
        .driver
        .seed_container("container-ctr-intruder", managed_labels("ctr-intruder"), true);

    let report = reconcile(
        &harness.store,
        &(harness.driver.clone() as std::sync::Arc<dyn hearth_runtime::RuntimeDriver>),
        &harness.manager,
        &harness.activity,
    )
    .await;

    assert_eq!(report.runtime_count, 3);
    assert_eq!(report.stale_rows, 1);
    assert_eq!(report.foreign_destroyed, 1);

    // The stale claim is gone, the idle container survived.
    assert!(pool.claimed(&t1).await.unwrap().is_none());
    let remaining = harness.store.containers_in_pool(pool.pool_id()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(harness
        .driver
        .container_names()
        .contains(&remaining[0].runtime_name()));

    // No claimed rows left: restore starts no watches.
    let watches = harness.registry.restore_watches(&harness.reaper).await.unwrap();
    assert_eq!(watches, 0);
    assert!(harness.reaper.watched().is_empty());
}

#[tokio::test]
async fn surviving_claims_get_watches_back() {
    let yaml = Harness::workload_yaml(0, 3, "  file_idle_ttl_ms: 60000\n");
    let harness = Harness::with_workload(&yaml, Duration::from_millis(100)).await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    let outcome = harness.pipeline.claim(&pool, &t1).await.unwrap();
    // Simulate restart: in-memory watches are lost.
    harness.reaper.unwatch(&outcome.container.container_id).await;

    let report = reconcile(
        &harness.store,
        &(harness.driver.clone() as std::sync::Arc<dyn hearth_runtime::RuntimeDriver>),
        &harness.manager,
        &harness.activity,
    )
    .await;
    assert_eq!(report.stale_rows, 0);

    let watches = harness.registry.restore_watches(&harness.reaper).await.unwrap();
    assert_eq!(watches, 1);
    assert!(harness.reaper.is_watching(&outcome.container.container_id));
}
