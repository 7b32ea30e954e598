// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the end-to-end specs.

use std::sync::Arc;
use std::time::Duration;

pub use hearth_core::event::ActivityKind;
pub use hearth_core::id::{ContainerId, PoolId, TenantId};
pub use hearth_pool::{
    ActivityLog, ClaimPipeline, ContainerManager, HookRunner, HostLayout, IdleReaper,
    ManagerDefaults, PoolError, PoolRegistry, PoolScheduler, ReleaseOptions,
};
pub use hearth_runtime::MockDriver;
pub use hearth_store::Store;
pub use hearth_sync::{RcloneExecutor, SinkRegistry, SyncCoordinator};
pub use hearth_workload::WorkloadRegistry;

/// Fully wired engine over the mock driver and a tempdir host layout.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Store,
    pub driver: Arc<MockDriver>,
    pub manager: Arc<ContainerManager>,
    pub activity: Arc<ActivityLog>,
    pub reaper: Arc<IdleReaper>,
    pub pipeline: Arc<ClaimPipeline>,
    pub registry: Arc<PoolRegistry>,
    pub workloads: Arc<WorkloadRegistry>,
}

impl Harness {
    /// Build the stack and register one workload from YAML.
    pub async fn with_workload(workload_yaml: &str, reaper_poll: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("hearth.db")).await.unwrap();
        let driver = Arc::new(MockDriver::new());
        let manager = Arc::new(ContainerManager::new(
            driver.clone(),
            HostLayout::under(dir.path()),
            ManagerDefaults::default(),
        ));
        let activity = Arc::new(ActivityLog::new(store.clone(), 10_000));
        let reaper = Arc::new(IdleReaper::new(store.clone(), reaper_poll));
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            SinkRegistry::with_builtins(),
            RcloneExecutor::new("rclone"),
        ));
        let pipeline = Arc::new(ClaimPipeline::new(
            manager.clone(),
            coordinator,
            HookRunner::new(driver.clone(), activity.clone()),
            activity.clone(),
            reaper.clone(),
        ));
        let workloads = Arc::new(WorkloadRegistry::new());
        workloads.upsert(serde_yaml::from_str(workload_yaml).unwrap()).unwrap();
        let registry = Arc::new(PoolRegistry::new(
            store.clone(),
            manager.clone(),
            activity.clone(),
            workloads.clone(),
        ));
        registry.bind_reaper(&reaper, &pipeline);

        Self { dir, store, driver, manager, activity, reaper, pipeline, registry, workloads }
    }

    /// Workload YAML with a pool block and optional extra lines.
    pub fn workload_yaml(min_idle: u64, max_size: u64, extra: &str) -> String {
        format!(
            "id: web\nimage: nginx:alpine\nhealth_check:\n  test: [\"CMD\", \"true\"]\n  interval_ms: 100\npool:\n  min_idle: {min_idle}\n  max_size: {max_size}\n  acquire_timeout_ms: 2000\n{extra}"
        )
    }

    pub async fn pool(&self) -> Arc<PoolScheduler> {
        self.registry.create_pool("web").await.unwrap()
    }

    pub fn state_dir(&self, id: &ContainerId) -> std::path::PathBuf {
        self.manager.state_dir(id)
    }
}

pub fn tenant(name: &str) -> TenantId {
    TenantId::new(name)
}
