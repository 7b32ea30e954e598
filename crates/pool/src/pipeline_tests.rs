// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::activity::ActivityLog;
use crate::manager::{HostLayout, ManagerDefaults};
use crate::reaper::IdleReaper;
use crate::scheduler::{PoolConfig, PoolScheduler};
use hearth_core::event::ActivityKind;
use hearth_core::id::PoolId;
use hearth_runtime::{ExecResult, MockDriver};
use hearth_store::{ActivityFilter, Store};
use hearth_sync::{RcloneExecutor, SinkRegistry, SyncCoordinator};
use std::os::unix::fs::PermissionsExt;

struct Fixture {
    _dir: tempfile::TempDir,
    store: Store,
    driver: Arc<MockDriver>,
    activity: Arc<ActivityLog>,
    reaper: Arc<IdleReaper>,
    pipeline: ClaimPipeline,
    scheduler: Arc<PoolScheduler>,
}

fn write_tool(dir: &std::path::Path, body: &str) -> String {
    let path = dir.join("fake-rclone");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.display().to_string()
}

async fn fixture_with(workload_yaml_extra: &str, tool_body: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("hearth.db")).await.unwrap();
    let driver = Arc::new(MockDriver::new());
    let manager = Arc::new(ContainerManager::new(
        driver.clone(),
        HostLayout::under(dir.path()),
        ManagerDefaults::default(),
    ));
    let activity = Arc::new(ActivityLog::new(store.clone(), 1000));
    let reaper = Arc::new(IdleReaper::new(store.clone(), Duration::from_millis(30)));
    let coordinator = Arc::new(SyncCoordinator::new(
        store.clone(),
        SinkRegistry::with_builtins(),
        RcloneExecutor::new(write_tool(dir.path(), tool_body)),
    ));

    let yaml = format!(
        "id: web\nimage: nginx:alpine\nhealth_check:\n  test: [\"CMD\", \"true\"]\n  interval_ms: 100\n{workload_yaml_extra}"
    );
    let workload: Arc<WorkloadSpec> = Arc::new(serde_yaml::from_str(&yaml).unwrap());

    let mut config = PoolConfig::from_workload(PoolId::from_string("pool-p"), &workload);
    config.acquire_timeout_ms = 2_000;
    let scheduler = Arc::new(PoolScheduler::new(
        workload,
        config,
        store.clone(),
        manager.clone(),
        activity.clone(),
    ));

    let pipeline = ClaimPipeline::new(
        manager,
        coordinator,
        HookRunner::new(driver.clone(), activity.clone()),
        activity.clone(),
        reaper.clone(),
    );
    Fixture { _dir: dir, store, driver, activity, reaper, pipeline, scheduler }
}

async fn fixture(extra: &str) -> Fixture {
    fixture_with(extra, "exit 0").await
}

async fn kinds(fx: &Fixture) -> Vec<ActivityKind> {
    let mut events = fx.activity.recent(&ActivityFilter::latest(100)).await.unwrap();
    events.reverse();
    events.into_iter().map(|e| e.kind).collect()
}

#[tokio::test]
async fn claim_restarts_waits_and_returns_hostname() {
    let fx = fixture("").await;
    let tenant = TenantId::new("t1");
    let outcome = fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();

    assert_eq!(outcome.hostname, format!("container-{}", outcome.container.container_id));
    assert!(!outcome.affinity);
    assert_eq!(fx.driver.restarted(), vec![outcome.hostname.clone()]);

    let recorded = kinds(&fx).await;
    assert!(recorded.contains(&ActivityKind::ContainerClaimed));
}

#[tokio::test]
async fn release_is_idempotent_and_emits() {
    let fx = fixture("").await;
    let tenant = TenantId::new("t1");
    fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();

    assert!(fx.pipeline.release(&fx.scheduler, &tenant, ReleaseOptions::default()).await.unwrap());
    assert!(!fx.pipeline.release(&fx.scheduler, &tenant, ReleaseOptions::default()).await.unwrap());
    assert!(kinds(&fx).await.contains(&ActivityKind::ContainerReleased));
}

#[tokio::test]
async fn post_claim_hook_abort_rolls_back() {
    let fx = fixture(
        "hooks:\n  post_claim:\n    - command: [\"bad\"]\n      on_error: fail\n",
    )
    .await;
    let tenant = TenantId::new("t1");
    fx.driver.push_exec_result(ExecResult { exit_code: 1, ..Default::default() });

    let err = fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap_err();
    assert!(
        matches!(err, PoolError::HookAborted { point: HookPoint::PostClaim, index: 0, .. }),
        "{err:?}"
    );

    // E5: tenant holds nothing, the container went back to idle.
    assert!(fx.scheduler.claimed(&tenant).await.unwrap().is_none());
    let stats = fx.scheduler.stats().await.unwrap();
    assert_eq!(stats.borrowed, 0);
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn pre_release_hook_abort_still_releases() {
    let fx = fixture(
        "hooks:\n  pre_release:\n    - command: [\"flaky\"]\n      on_error: fail\n",
    )
    .await;
    let tenant = TenantId::new("t1");
    fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();
    fx.driver.push_exec_result(ExecResult { exit_code: 1, ..Default::default() });

    let released =
        fx.pipeline.release(&fx.scheduler, &tenant, ReleaseOptions::default()).await.unwrap();
    assert!(released);
    assert!(fx.scheduler.claimed(&tenant).await.unwrap().is_none());
    assert!(kinds(&fx).await.contains(&ActivityKind::HookFailed));
}

#[tokio::test]
async fn file_idle_ttl_starts_and_clears_watch() {
    let fx = fixture("pool:\n  min_idle: 0\n  max_size: 3\n  file_idle_ttl_ms: 60000\n").await;
    let tenant = TenantId::new("t1");
    let outcome = fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();
    assert!(fx.reaper.is_watching(&outcome.container.container_id));

    let row = fx.store.container(&outcome.container.container_id).await.unwrap().unwrap();
    assert!(row.idle_expires_at_ms.is_some());

    fx.pipeline.release(&fx.scheduler, &tenant, ReleaseOptions::default()).await.unwrap();
    assert!(!fx.reaper.is_watching(&outcome.container.container_id));
}

#[tokio::test]
async fn expire_releases_and_emits() {
    let fx = fixture("pool:\n  min_idle: 0\n  max_size: 3\n  file_idle_ttl_ms: 60000\n").await;
    let tenant = TenantId::new("t1");
    fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();

    assert!(fx.pipeline.expire(&fx.scheduler, &tenant).await.unwrap());
    assert!(fx.scheduler.claimed(&tenant).await.unwrap().is_none());
    let recorded = kinds(&fx).await;
    assert!(recorded.contains(&ActivityKind::ContainerExpired));
    assert!(recorded.contains(&ActivityKind::ContainerReleased));
}

const SYNC_YAML: &str = "sync:\n  sink:\n    type: s3\n    bucket: b\n    prefix: p/${tenantId}\n  mappings:\n    - container_path: work\n      sink_path: work\n      direction: download\n";

#[tokio::test]
async fn claim_sync_download_runs_and_completes() {
    let fx = fixture_with(SYNC_YAML, "exit 0").await;
    let tenant = TenantId::new("t1");
    fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();

    let recorded = kinds(&fx).await;
    assert!(recorded.contains(&ActivityKind::SyncStarted));
    assert!(recorded.contains(&ActivityKind::SyncCompleted));
}

#[tokio::test]
async fn failed_initial_download_aborts_claim() {
    let fx = fixture_with(SYNC_YAML, "echo 'no such host' >&2\nexit 1").await;
    let tenant = TenantId::new("t1");

    let err = fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap_err();
    assert!(matches!(err, PoolError::SyncFailed(_)), "{err:?}");
    // Rolled back: no claim, container idle again.
    assert!(fx.scheduler.claimed(&tenant).await.unwrap().is_none());
    assert_eq!(fx.scheduler.stats().await.unwrap().borrowed, 0);
    assert!(kinds(&fx).await.contains(&ActivityKind::SyncFailed));
}

#[tokio::test]
async fn release_skip_sync_skips_upload() {
    let fx = fixture_with(
        "sync:\n  sink:\n    type: s3\n    bucket: b\n  mappings:\n    - container_path: work\n      sink_path: work\n      direction: upload\n",
        "exit 0",
    )
    .await;
    let tenant = TenantId::new("t1");
    fx.pipeline.claim(&fx.scheduler, &tenant).await.unwrap();
    fx.pipeline
        .release(&fx.scheduler, &tenant, ReleaseOptions { skip_sync: true })
        .await
        .unwrap();

    // No upload sync events beyond the claim-time ones (upload mappings
    // do not run at claim).
    let recorded = kinds(&fx).await;
    let started = recorded.iter().filter(|k| **k == ActivityKind::SyncStarted).count();
    assert_eq!(started, 1, "skip_sync still ran the upload: {recorded:?}");
}
