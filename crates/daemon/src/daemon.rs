// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring and graceful shutdown.
//!
//! Startup order: instance lock → store → workload scan → recovery
//! reconciliation → pool resume → reaper watch restore → workload
//! watcher. Shutdown walks the chain in reverse, starting with the
//! watcher, and closes the store last.

use std::fs::File;
use std::sync::Arc;

use fs2::FileExt;
use tracing::{info, warn};

use hearth_pool::{
    reconcile, ActivityLog, ClaimPipeline, ContainerManager, HookRunner, HostLayout, IdleReaper,
    ManagerDefaults, PoolError, PoolRegistry, RecoveryReport,
};
use hearth_runtime::{DockerDriver, ResourceLimits, RuntimeDriver, RuntimeError};
use hearth_store::{Store, StoreError};
use hearth_sync::{RcloneExecutor, SinkRegistry, SyncCoordinator};
use hearth_workload::WorkloadRegistry;

use crate::env::DaemonEnv;
use crate::watcher::{self, WorkloadWatcher};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("another hearthd instance holds {0}")]
    AlreadyRunning(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A running daemon's component graph.
pub struct Daemon {
    env: DaemonEnv,
    store: Store,
    workloads: Arc<WorkloadRegistry>,
    registry: Arc<PoolRegistry>,
    pipeline: Arc<ClaimPipeline>,
    reaper: Arc<IdleReaper>,
    coordinator: Arc<SyncCoordinator>,
    activity: Arc<ActivityLog>,
    watcher: Option<WorkloadWatcher>,
    recovery: RecoveryReport,
    _lock: File,
}

impl Daemon {
    /// Start against the local Docker daemon.
    pub async fn start(env: DaemonEnv) -> Result<Self, DaemonError> {
        let driver: Arc<dyn RuntimeDriver> = Arc::new(DockerDriver::connect()?);
        Self::start_with_driver(env, driver).await
    }

    /// Start with an explicit driver (tests, alternate backends).
    pub async fn start_with_driver(
        env: DaemonEnv,
        driver: Arc<dyn RuntimeDriver>,
    ) -> Result<Self, DaemonError> {
        std::fs::create_dir_all(&env.data_dir)?;
        let lock = File::create(env.lock_path())?;
        if lock.try_lock_exclusive().is_err() {
            return Err(DaemonError::AlreadyRunning(env.lock_path().display().to_string()));
        }

        let store = Store::open(&env.store_path()).await?;
        let activity = Arc::new(ActivityLog::new(store.clone(), env.activity_max_events));

        // Mirror every activity event into the tracing log.
        activity.subscribe(Arc::new(|event| {
            info!(kind = %event.kind, message = %event.message, "activity");
        }));

        let memory_bytes = env
            .default_memory
            .as_deref()
            .and_then(|raw| match ResourceLimits::parse_memory(raw) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(raw, error = %e, "invalid default memory; using none");
                    None
                }
            });
        let manager = Arc::new(ContainerManager::new(
            driver.clone(),
            HostLayout::under(&env.data_dir),
            ManagerDefaults {
                tmpfs_size_bytes: env.tmpfs_size_bytes,
                cpu_shares: env.default_cpu_shares,
                memory_bytes,
                ..ManagerDefaults::default()
            },
        ));

        let workloads = Arc::new(WorkloadRegistry::new());
        let mut workload_files = watcher::ScanState::new();
        match &env.workloads_dir {
            Some(dir) if dir.is_dir() => {
                watcher::scan_workloads(dir, &workloads, &mut workload_files);
            }
            Some(dir) => warn!(dir = %dir.display(), "workloads dir missing"),
            None => {}
        }

        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            SinkRegistry::with_builtins(),
            RcloneExecutor::new(env.rclone_binary.clone())
                .with_timeout(env.rclone_timeout)
                .with_verbose(env.rclone_verbose),
        ));
        let reaper = Arc::new(IdleReaper::new(store.clone(), env.reaper_poll_interval));
        let pipeline = Arc::new(ClaimPipeline::new(
            manager.clone(),
            coordinator.clone(),
            HookRunner::new(driver.clone(), activity.clone()),
            activity.clone(),
            reaper.clone(),
        ));
        let registry = Arc::new(PoolRegistry::new(
            store.clone(),
            manager.clone(),
            activity.clone(),
            workloads.clone(),
        ));
        registry.bind_reaper(&reaper, &pipeline);

        // Converge with the runtime before any fill loop runs.
        let recovery = reconcile(&store, &driver, &manager, &activity).await;

        // Resume persisted pools whose workloads are still registered.
        for record in store.pools().await? {
            match registry.resume_pool(&record) {
                Ok(_) => {}
                Err(PoolError::WorkloadNotFound(id)) => {
                    warn!(pool_id = %record.pool_id, workload_id = %id,
                          "pool not resumed; workload missing");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let watches = registry.restore_watches(&reaper).await?;

        // The watcher comes up last so mid-startup scans cannot race
        // pool resume.
        let watcher = env
            .workloads_dir
            .as_ref()
            .filter(|dir| dir.is_dir())
            .map(|dir| {
                WorkloadWatcher::spawn(
                    dir.clone(),
                    workloads.clone(),
                    env.workloads_poll_interval,
                    workload_files,
                )
            });

        info!(
            pools = registry.pool_ids().len(),
            watches,
            stale_rows = recovery.stale_rows,
            "hearthd started"
        );
        Ok(Self {
            env,
            store,
            workloads,
            registry,
            pipeline,
            reaper,
            coordinator,
            activity,
            watcher,
            recovery,
            _lock: lock,
        })
    }

    pub fn env(&self) -> &DaemonEnv {
        &self.env
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn workloads(&self) -> &Arc<WorkloadRegistry> {
        &self.workloads
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<ClaimPipeline> {
        &self.pipeline
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Graceful shutdown: workload watcher, fill loops, reaper,
    /// coordinator, store, in that order. `drain` destroys every
    /// container; otherwise rows and containers are preserved for the
    /// next start's recovery.
    pub async fn shutdown(&self, drain: bool) {
        info!(drain, "hearthd shutting down");
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
        if drain {
            for pool_id in self.registry.pool_ids() {
                if let Err(e) = self.registry.destroy_pool(&pool_id).await {
                    warn!(pool_id = %pool_id, error = %e, "drain failed");
                }
            }
        } else {
            self.registry.shutdown();
        }
        self.reaper.shutdown().await;
        self.coordinator.shutdown(self.env.shutdown_deadline).await;
        self.store.close().await;
        info!("hearthd stopped");
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
