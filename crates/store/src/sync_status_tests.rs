// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;

async fn open_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("hearth.db")).await.unwrap();
    (dir, store)
}

fn err_entry(msg: &str) -> SyncErrorEntry {
    SyncErrorEntry { message: msg.into(), mapping_path: Some("work".into()), timestamp_ms: 1 }
}

#[tokio::test]
async fn start_sets_syncing_and_counts() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");

    let s1 = store.sync_started(&t, "web").await.unwrap();
    assert_eq!(s1.state, SyncState::Syncing);
    assert_eq!(s1.pending_count, 1);

    let s2 = store.sync_started(&t, "web").await.unwrap();
    assert_eq!(s2.pending_count, 2);
    assert_eq!(s2.state, SyncState::Syncing);
}

#[tokio::test]
async fn success_completion_drains_to_idle() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    store.sync_started(&t, "web").await.unwrap();
    store.sync_started(&t, "web").await.unwrap();

    let mid = store.sync_completed(&t, "web", 100, None).await.unwrap();
    assert_eq!(mid.state, SyncState::Syncing);
    assert_eq!(mid.pending_count, 1);

    let done = store.sync_completed(&t, "web", 200, None).await.unwrap();
    assert_eq!(done.state, SyncState::Idle);
    assert_eq!(done.pending_count, 0);
    assert_eq!(done.last_sync_at_ms, Some(200));
    assert!(done.errors.is_empty());
}

#[tokio::test]
async fn failure_lands_in_error_state() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    store.sync_started(&t, "web").await.unwrap();

    let failed = store
        .sync_completed(&t, "web", 100, Some(err_entry("network: timeout")))
        .await
        .unwrap();
    assert_eq!(failed.state, SyncState::Error);
    assert_eq!(failed.pending_count, 0);
    assert_eq!(failed.errors.len(), 1);
    // Failures do not advance last_sync_at.
    assert_eq!(failed.last_sync_at_ms, None);
}

#[tokio::test]
async fn success_after_failure_clears_ring() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    store.sync_started(&t, "web").await.unwrap();
    store.sync_completed(&t, "web", 100, Some(err_entry("boom"))).await.unwrap();

    store.sync_started(&t, "web").await.unwrap();
    let done = store.sync_completed(&t, "web", 200, None).await.unwrap();
    assert_eq!(done.state, SyncState::Idle);
    assert!(done.errors.is_empty());
    assert_eq!(done.last_sync_at_ms, Some(200));
}

#[tokio::test]
async fn error_ring_is_bounded() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    for i in 0..(MAX_SYNC_ERRORS + 5) {
        store.sync_started(&t, "web").await.unwrap();
        store
            .sync_completed(&t, "web", i as u64, Some(err_entry(&format!("err {i}"))))
            .await
            .unwrap();
    }
    let statuses = store.sync_statuses_for_tenant(&t).await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].errors.len(), MAX_SYNC_ERRORS);
    // Oldest entries were dropped.
    assert_eq!(statuses[0].errors[0].message, "err 5");
}

#[tokio::test]
async fn state_queries_filter() {
    let (_dir, store) = open_store().await;
    let t1 = TenantId::new("t1");
    let t2 = TenantId::new("t2");
    store.sync_started(&t1, "web").await.unwrap();
    store.sync_started(&t2, "web").await.unwrap();
    store.sync_completed(&t2, "web", 10, Some(err_entry("x"))).await.unwrap();

    let syncing = store.sync_statuses_in_state(SyncState::Syncing).await.unwrap();
    assert_eq!(syncing.len(), 1);
    assert_eq!(syncing[0].tenant_id, TenantId::new("t1"));

    let errored = store.sync_statuses_in_state(SyncState::Error).await.unwrap();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].tenant_id, TenantId::new("t2"));
}

#[tokio::test]
async fn delete_sync_status_reports() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    store.sync_started(&t, "web").await.unwrap();
    assert!(store.delete_sync_status(&t, "web").await.unwrap());
    assert!(!store.delete_sync_status(&t, "web").await.unwrap());
}

#[tokio::test]
async fn completion_without_start_floors_at_zero() {
    let (_dir, store) = open_store().await;
    let t = TenantId::new("t1");
    let status = store.sync_completed(&t, "web", 50, None).await.unwrap();
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.state, SyncState::Idle);
}
