// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim/release pipeline.
//!
//! claim: acquire → sync (download/bisync) → restart → readiness →
//! post-claim hooks → idle watch. release runs the inverse: unwatch →
//! pre-release hooks → sync upload → scheduler release. A post-claim
//! hook abort rolls the claim back by releasing with sync skipped; a
//! pre-release hook abort is logged and release continues so no
//! container is left half-released.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use hearth_core::container::runtime_name;
use hearth_core::event::ActivityKind;
use hearth_core::hook::HookPoint;
use hearth_core::id::TenantId;
use hearth_sync::{MappingReport, SyncCoordinator};
use hearth_workload::WorkloadSpec;

use crate::activity::ActivityLog;
use crate::error::PoolError;
use crate::hooks::{abort_reason, HookRunner};
use crate::manager::ContainerManager;
use crate::reaper::IdleReaper;
use crate::scheduler::PoolScheduler;

/// Restart deadline inside the claim path.
const CLAIM_RESTART_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a successful claim.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub container: hearth_core::container::PoolContainer,
    /// DNS-resolvable name of the leased container.
    pub hostname: String,
    pub affinity: bool,
}

/// Release options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseOptions {
    /// Skip the upload sync (hook-abort rollback, forced teardown).
    pub skip_sync: bool,
}

/// Orchestrates claims and releases over a scheduler.
pub struct ClaimPipeline {
    manager: Arc<ContainerManager>,
    coordinator: Arc<SyncCoordinator>,
    hooks: HookRunner,
    activity: Arc<ActivityLog>,
    reaper: Arc<IdleReaper>,
}

impl ClaimPipeline {
    pub fn new(
        manager: Arc<ContainerManager>,
        coordinator: Arc<SyncCoordinator>,
        hooks: HookRunner,
        activity: Arc<ActivityLog>,
        reaper: Arc<IdleReaper>,
    ) -> Self {
        Self { manager, coordinator, hooks, activity, reaper }
    }

    /// Lease a healthy container to `tenant`.
    pub async fn claim(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
    ) -> Result<ClaimOutcome, PoolError> {
        let workload = scheduler.workload().clone();
        let acquired = scheduler.acquire(tenant).await?;
        let container = acquired.container.clone();
        let id = container.container_id;

        self.activity
            .event(ActivityKind::ContainerClaimed, format!("container {id} claimed"))
            .pool(scheduler.pool_id())
            .container(&id)
            .tenant(tenant)
            .metadata(serde_json::json!({ "affinity": acquired.affinity }))
            .emit_logged()
            .await;

        if let Some(result) = self
            .sync_on_claim(&workload, scheduler, tenant, &acquired)
            .await?
        {
            // Initial download failed: the tenant must not see an empty
            // tree that pretends to be restored state.
            self.rollback_claim(scheduler, tenant).await;
            return Err(result);
        }

        self.manager.restart(&id, CLAIM_RESTART_TIMEOUT).await?;
        self.manager
            .wait_healthy(
                &id,
                Duration::from_millis(scheduler.config().acquire_timeout_ms),
                Duration::from_millis(workload.health_check.interval_ms.clamp(100, 2_000)),
            )
            .await?;

        if let Some(hooks) = workload.hooks.as_ref().filter(|h| !h.post_claim.is_empty()) {
            let outcome = self.hooks.run(HookPoint::PostClaim, &hooks.post_claim, &container).await;
            if outcome.aborted {
                let reason = abort_reason(&outcome);
                let index = outcome.aborted_at.unwrap_or(0);
                self.rollback_claim(scheduler, tenant).await;
                return Err(PoolError::HookAborted { point: HookPoint::PostClaim, index, reason });
            }
        }

        if let Some(ttl) = scheduler.config().file_idle_ttl_ms {
            self.reaper
                .watch(&id, tenant, scheduler.pool_id(), &self.manager.state_dir(&id), ttl)
                .await;
        }

        if let Some(sync) = &workload.sync {
            if sync.policy.interval_ms.is_some() {
                self.coordinator.start_periodic(
                    tenant,
                    &workload.id,
                    sync,
                    &self.manager.state_dir(&id),
                );
            }
        }

        info!(tenant = %tenant, container_id = %id, affinity = acquired.affinity, "claim complete");
        Ok(ClaimOutcome {
            hostname: runtime_name(&id),
            container,
            affinity: acquired.affinity,
        })
    }

    /// Release the tenant's container. Idempotent: returns `Ok(false)`
    /// when no claim exists.
    pub async fn release(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
        opts: ReleaseOptions,
    ) -> Result<bool, PoolError> {
        let workload = scheduler.workload().clone();
        let Some(container) = scheduler.claimed(tenant).await? else {
            return Ok(false);
        };
        let id = container.container_id;

        self.reaper.unwatch(&id).await;
        self.coordinator.stop_periodic(&workload.id, tenant);

        if let Some(hooks) = workload.hooks.as_ref().filter(|h| !h.pre_release.is_empty()) {
            let outcome = self.hooks.run(HookPoint::PreRelease, &hooks.pre_release, &container).await;
            if outcome.aborted {
                // A partially hooked container must not be left
                // half-released; the failure is recorded and we
                // continue.
                warn!(tenant = %tenant, container_id = %id, "pre-release hook aborted; releasing anyway");
            }
        }

        if !opts.skip_sync {
            if let Some(sync) = workload.sync.as_ref().filter(|s| s.policy.on_release) {
                self.emit_sync_started(scheduler, tenant, &id, "upload").await;
                let reports = self
                    .coordinator
                    .on_release(tenant, &workload.id, sync, &self.manager.state_dir(&id))
                    .await;
                self.report_sync(scheduler, tenant, &id, reports).await;
            }
        }

        self.activity
            .event(ActivityKind::ContainerReleased, format!("container {id} released"))
            .pool(scheduler.pool_id())
            .container(&id)
            .tenant(tenant)
            .emit_logged()
            .await;
        scheduler.release(tenant).await?;
        Ok(true)
    }

    /// Release initiated by the reaper on file-idleness.
    pub async fn expire(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
    ) -> Result<bool, PoolError> {
        if let Some(container) = scheduler.claimed(tenant).await? {
            self.activity
                .event(
                    ActivityKind::ContainerExpired,
                    format!("container {} idle past TTL", container.container_id),
                )
                .pool(scheduler.pool_id())
                .container(&container.container_id)
                .tenant(tenant)
                .emit_logged()
                .await;
        }
        self.release(scheduler, tenant, ReleaseOptions::default()).await
    }

    /// Claim-time sync. Returns `Some(error)` when the claim must abort
    /// (failed initial download).
    async fn sync_on_claim(
        &self,
        workload: &WorkloadSpec,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
        acquired: &crate::scheduler::Acquired,
    ) -> Result<Option<PoolError>, PoolError> {
        let Some(sync) = workload.sync.as_ref().filter(|s| s.policy.on_claim) else {
            return Ok(None);
        };
        let id = acquired.container.container_id;
        let initial = !acquired.affinity;
        let direction = if acquired.affinity { "bisync" } else { "download" };

        self.emit_sync_started(scheduler, tenant, &id, direction).await;
        let reports = self
            .coordinator
            .on_claim(tenant, &workload.id, sync, &self.manager.state_dir(&id), initial)
            .await;

        match reports {
            Ok(reports) => {
                let fatal = initial && reports.iter().any(MappingReport::failed_download);
                self.report_sync_ok(scheduler, tenant, &id, &reports).await;
                if fatal {
                    return Ok(Some(PoolError::SyncFailed(
                        "initial download failed".to_string(),
                    )));
                }
                Ok(None)
            }
            Err(e) => {
                // Coordinator-level failure (spawn, unknown sink).
                self.activity
                    .event(ActivityKind::SyncFailed, format!("sync failed: {e}"))
                    .pool(scheduler.pool_id())
                    .container(&id)
                    .tenant(tenant)
                    .emit_logged()
                    .await;
                if initial && sync_has_download(sync) {
                    return Ok(Some(PoolError::SyncFailed(e.to_string())));
                }
                warn!(tenant = %tenant, error = %e, "claim sync failed; continuing");
                Ok(None)
            }
        }
    }

    async fn rollback_claim(&self, scheduler: &PoolScheduler, tenant: &TenantId) {
        if let Err(e) = self
            .release(scheduler, tenant, ReleaseOptions { skip_sync: true })
            .await
        {
            warn!(tenant = %tenant, error = %e, "claim rollback release failed");
        }
    }

    async fn emit_sync_started(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
        id: &hearth_core::id::ContainerId,
        direction: &str,
    ) {
        self.activity
            .event(ActivityKind::SyncStarted, format!("sync started ({direction})"))
            .pool(scheduler.pool_id())
            .container(id)
            .tenant(tenant)
            .metadata(serde_json::json!({ "direction": direction }))
            .emit_logged()
            .await;
    }

    async fn report_sync(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
        id: &hearth_core::id::ContainerId,
        reports: Result<Vec<MappingReport>, hearth_sync::SyncError>,
    ) {
        match reports {
            Ok(reports) => self.report_sync_ok(scheduler, tenant, id, &reports).await,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "sync failed");
                self.activity
                    .event(ActivityKind::SyncFailed, format!("sync failed: {e}"))
                    .pool(scheduler.pool_id())
                    .container(id)
                    .tenant(tenant)
                    .emit_logged()
                    .await;
            }
        }
    }

    async fn report_sync_ok(
        &self,
        scheduler: &PoolScheduler,
        tenant: &TenantId,
        id: &hearth_core::id::ContainerId,
        reports: &[MappingReport],
    ) {
        let failed: Vec<&MappingReport> = reports.iter().filter(|r| !r.succeeded()).collect();
        if failed.is_empty() {
            self.activity
                .event(ActivityKind::SyncCompleted, "sync completed")
                .pool(scheduler.pool_id())
                .container(id)
                .tenant(tenant)
                .metadata(serde_json::json!({ "mappings": reports.len() }))
                .emit_logged()
                .await;
        } else {
            let paths: Vec<&str> = failed.iter().map(|r| r.sink_path.as_str()).collect();
            self.activity
                .event(ActivityKind::SyncFailed, format!("sync failed for {}", paths.join(", ")))
                .pool(scheduler.pool_id())
                .container(id)
                .tenant(tenant)
                .metadata(serde_json::json!({ "failed_paths": paths }))
                .emit_logged()
                .await;
        }
    }
}

fn sync_has_download(sync: &hearth_workload::SyncConfig) -> bool {
    sync.mappings
        .iter()
        .any(|m| m.direction == hearth_workload::MappingDirection::Download)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
