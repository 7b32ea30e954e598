// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pool scheduler: fill loop, admission, capacity, release.
//!
//! No in-memory idle queue exists; the store's row status is
//! authoritative and the conditional claim update is the only critical
//! section. Racing claimers both attempt the update and exactly one
//! observes the row.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_core::clock::{Clock, SystemClock};
use hearth_core::container::{ContainerStatus, PoolContainer};
use hearth_core::event::ActivityKind;
use hearth_core::id::{ContainerId, PoolId, TenantId};
use hearth_core::stats::PoolStats;
use hearth_workload::WorkloadSpec;

use crate::activity::ActivityLog;
use crate::error::PoolError;
use crate::manager::ContainerManager;

/// Scheduler configuration, typically derived from the workload's pool
/// defaults.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_id: PoolId,
    pub min_idle: u64,
    pub max_size: u64,
    pub idle_timeout_ms: u64,
    pub eviction_interval_ms: u64,
    /// Deadline for the claim pipeline's readiness wait.
    pub acquire_timeout_ms: u64,
    /// Network override for every container in this pool.
    pub networks: Option<Vec<String>>,
    pub file_idle_ttl_ms: Option<u64>,
}

impl PoolConfig {
    pub fn from_workload(pool_id: PoolId, workload: &WorkloadSpec) -> Self {
        let defaults = workload.pool.clone().unwrap_or_default();
        Self {
            pool_id,
            min_idle: defaults.min_idle,
            max_size: defaults.max_size,
            idle_timeout_ms: defaults.idle_timeout_ms,
            eviction_interval_ms: 30_000,
            acquire_timeout_ms: defaults.acquire_timeout_ms,
            networks: None,
            file_idle_ttl_ms: defaults.file_idle_ttl_ms,
        }
    }
}

/// A successful acquire.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub container: PoolContainer,
    /// True when the tenant got a container that still holds its state
    /// (existing claim or `last_tenant_id` match, no wipe).
    pub affinity: bool,
}

/// One pool's scheduler. Clones share the cancellation token and the
/// fill-loop handle.
#[derive(Clone)]
pub struct PoolScheduler {
    workload: Arc<WorkloadSpec>,
    config: PoolConfig,
    store: hearth_store::Store,
    manager: Arc<ContainerManager>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    fill_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for PoolScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PoolScheduler {
    pub fn new(
        workload: Arc<WorkloadSpec>,
        config: PoolConfig,
        store: hearth_store::Store,
        manager: Arc<ContainerManager>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self::with_clock(workload, config, store, manager, activity, Arc::new(SystemClock))
    }

    pub fn with_clock(
        workload: Arc<WorkloadSpec>,
        config: PoolConfig,
        store: hearth_store::Store,
        manager: Arc<ContainerManager>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workload,
            config,
            store,
            manager,
            activity,
            clock,
            cancel: CancellationToken::new(),
            fill_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.config.pool_id
    }

    pub fn workload(&self) -> &Arc<WorkloadSpec> {
        &self.workload
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start the background fill loop. The first tick runs immediately;
    /// later ticks follow every `eviction_interval_ms`.
    pub fn start(&self) {
        let mut task = self.fill_task.lock();
        if task.is_some() {
            return;
        }
        let scheduler = self.clone();
        *task = Some(tokio::spawn(async move {
            let interval = Duration::from_millis(scheduler.config.eviction_interval_ms.max(1));
            loop {
                if scheduler.cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = scheduler.fill_once().await {
                    warn!(pool_id = %scheduler.config.pool_id, error = %e, "fill tick failed");
                }
                tokio::select! {
                    _ = scheduler.cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }));
    }

    /// Stop the fill loop, leaving rows and containers intact.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.fill_task.lock().take() {
            task.abort();
        }
    }

    /// One fill pass: create idle containers up to
    /// `min(min_idle - idle, max_size - total)`, stopping at the first
    /// create error.
    pub async fn fill_once(&self) -> Result<u64, PoolError> {
        let counts = self.store.count_by_status(&self.config.pool_id).await?;
        let deficit = self.config.min_idle.saturating_sub(counts.idle);
        let capacity = self.config.max_size.saturating_sub(counts.total());
        let to_create = deficit.min(capacity);

        for n in 0..to_create {
            if let Err(e) = self.create_idle().await {
                warn!(pool_id = %self.config.pool_id, created = n, error = %e, "fill create failed");
                return Err(e);
            }
        }
        if to_create > 0 {
            debug!(pool_id = %self.config.pool_id, created = to_create, "fill pass complete");
        }
        Ok(to_create)
    }

    /// Create one idle container and insert its row.
    async fn create_idle(&self) -> Result<PoolContainer, PoolError> {
        let id = self
            .manager
            .create(&self.workload, &self.config.pool_id, self.config.networks.as_deref())
            .await?;
        let now = self.clock.epoch_ms();
        let row = PoolContainer {
            container_id: id,
            pool_id: self.config.pool_id,
            workload_id: self.workload.id.clone(),
            status: ContainerStatus::Idle,
            tenant_id: None,
            last_tenant_id: None,
            last_activity_ms: now,
            claimed_at_ms: None,
            idle_expires_at_ms: None,
            created_at_ms: now,
        };
        if let Err(e) = self.store.insert_container(&row).await {
            // Row insert failed after the runtime create; undo the
            // container so the store stays authoritative.
            if let Err(destroy_err) = self.manager.destroy(&id, 1).await {
                warn!(container_id = %id, error = %destroy_err, "undo create failed");
            }
            return Err(e.into());
        }
        self.activity
            .event(ActivityKind::ContainerCreated, format!("container {id} ready in pool"))
            .pool(&self.config.pool_id)
            .container(&id)
            .emit_logged()
            .await;
        Ok(row)
    }

    /// Acquire a container for `tenant`.
    ///
    /// Order: existing claim → no-wipe affinity → any idle (wipe on
    /// entry) → on-demand create, `PoolCapacity` at the cap. The
    /// capacity check is not transactionally coupled to the insert;
    /// under pathological concurrency the pool can transiently exceed
    /// `max_size` by one.
    pub async fn acquire(&self, tenant: &TenantId) -> Result<Acquired, PoolError> {
        let pool = &self.config.pool_id;
        let now = self.clock.epoch_ms();

        // 1. Existing claim short-circuit.
        if let Some(existing) = self.store.claimed(pool, tenant).await? {
            self.store.touch_claimed(pool, tenant, now).await?;
            debug!(pool_id = %pool, tenant = %tenant, container_id = %existing.container_id,
                   "acquire: existing claim");
            return Ok(Acquired { container: existing, affinity: true });
        }

        // 2. No-wipe affinity on the tenant's previous container.
        if let Some(candidate) = self.store.idle_with_last_tenant(pool, tenant).await? {
            if self.manager.is_healthy(&candidate.container_id).await {
                if let Some(row) = self
                    .store
                    .claim_idle(&candidate.container_id, tenant, self.clock.epoch_ms())
                    .await?
                {
                    debug!(pool_id = %pool, tenant = %tenant, container_id = %row.container_id,
                           "acquire: affinity claim");
                    return Ok(Acquired { container: row, affinity: true });
                }
                // Lost the race; fall through to the general path.
            } else {
                self.destroy_container(&candidate.container_id).await?;
            }
        }

        // 3. Any idle container, wiped on entry.
        loop {
            let Some(candidate) = self.store.first_idle(pool).await? else {
                break;
            };
            if !self.manager.is_healthy(&candidate.container_id).await {
                self.destroy_container(&candidate.container_id).await?;
                continue;
            }
            self.manager.wipe_for_new_tenant(&self.workload, &candidate.container_id).await?;
            match self
                .store
                .claim_idle(&candidate.container_id, tenant, self.clock.epoch_ms())
                .await?
            {
                Some(row) => {
                    debug!(pool_id = %pool, tenant = %tenant, container_id = %row.container_id,
                           "acquire: wiped idle claim");
                    return Ok(Acquired { container: row, affinity: false });
                }
                None => continue, // another claimer won; next candidate
            }
        }

        // 4. On-demand creation, bounded by max_size.
        let counts = self.store.count_by_status(pool).await?;
        if counts.total() >= self.config.max_size {
            return Err(PoolError::PoolCapacity {
                pool_id: *pool,
                max_size: self.config.max_size,
            });
        }
        let id = self
            .manager
            .create(&self.workload, pool, self.config.networks.as_deref())
            .await?;
        let now = self.clock.epoch_ms();
        let row = PoolContainer {
            container_id: id,
            pool_id: *pool,
            workload_id: self.workload.id.clone(),
            status: ContainerStatus::Claimed,
            tenant_id: Some(tenant.clone()),
            last_tenant_id: None,
            last_activity_ms: now,
            claimed_at_ms: Some(now),
            idle_expires_at_ms: None,
            created_at_ms: now,
        };
        if let Err(e) = self.store.insert_container(&row).await {
            if let Err(destroy_err) = self.manager.destroy(&id, 1).await {
                warn!(container_id = %id, error = %destroy_err, "undo on-demand create failed");
            }
            return Err(e.into());
        }
        info!(pool_id = %pool, tenant = %tenant, container_id = %id, "acquire: on-demand create");
        Ok(Acquired { container: row, affinity: false })
    }

    /// Return the tenant's container to the idle set. No wipe happens
    /// here; wipe is deferred to the next non-affinity acquire.
    pub async fn release(&self, tenant: &TenantId) -> Result<Option<PoolContainer>, PoolError> {
        let now = self.clock.epoch_ms();
        let released = self.store.release_claim(&self.config.pool_id, tenant, now).await?;
        if let Some(row) = &released {
            debug!(pool_id = %self.config.pool_id, tenant = %tenant,
                   container_id = %row.container_id, "released to idle");
        }
        Ok(released)
    }

    /// The tenant's claimed row in this pool, if any.
    pub async fn claimed(&self, tenant: &TenantId) -> Result<Option<PoolContainer>, PoolError> {
        Ok(self.store.claimed(&self.config.pool_id, tenant).await?)
    }

    /// Bump `last_activity` on the tenant's claim.
    pub async fn record_activity(&self, tenant: &TenantId) -> Result<bool, PoolError> {
        Ok(self
            .store
            .touch_claimed(&self.config.pool_id, tenant, self.clock.epoch_ms())
            .await?)
    }

    /// Destroy one container: row to `stopping`, runtime teardown, row
    /// deletion. A runtime failure still deletes the row.
    pub async fn destroy_container(&self, id: &ContainerId) -> Result<(), PoolError> {
        let Some(row) = self.store.container(id).await? else {
            return Err(PoolError::ContainerNotFound(*id));
        };
        self.store.mark_stopping(id).await?;
        if let Err(e) = self.manager.destroy(id, 2).await {
            warn!(container_id = %id, error = %e, "runtime destroy failed; deleting row anyway");
        }
        self.store.delete_container(id).await?;
        self.activity
            .event(ActivityKind::ContainerDestroyed, format!("container {id} destroyed"))
            .pool(&row.pool_id)
            .container(id)
            .emit_logged()
            .await;
        Ok(())
    }

    /// Scale the pool to `target` total containers. Scaling down only
    /// removes idle containers and never goes below the borrowed count.
    pub async fn scale_to(&self, target: u64) -> Result<(), PoolError> {
        let counts = self.store.count_by_status(&self.config.pool_id).await?;
        let current = counts.total();
        if target == current {
            return Ok(());
        }

        if target > current {
            for _ in current..target.min(self.config.max_size) {
                self.create_idle().await?;
            }
        } else {
            let floor = counts.claimed + counts.stopping;
            let effective = target.max(floor);
            if effective > target {
                warn!(pool_id = %self.config.pool_id, target, borrowed = floor,
                      "scale-down clamped to borrowed count");
            }
            let mut remaining = current - effective;
            while remaining > 0 {
                let Some(idle) = self.store.first_idle(&self.config.pool_id).await? else {
                    break;
                };
                self.destroy_container(&idle.container_id).await?;
                remaining -= 1;
            }
        }

        self.activity
            .event(ActivityKind::PoolScaled, format!("pool scaled to {target}"))
            .pool(&self.config.pool_id)
            .emit_logged()
            .await;
        Ok(())
    }

    /// Stop the fill loop and destroy every container in the pool.
    pub async fn drain(&self) -> Result<(), PoolError> {
        self.stop();
        let rows = self.store.containers_in_pool(&self.config.pool_id).await?;
        for row in rows {
            if let Err(e) = self.destroy_container(&row.container_id).await {
                warn!(container_id = %row.container_id, error = %e, "drain destroy failed");
            }
        }
        // Belt and braces: any row that raced the loop above.
        self.store.delete_pool_containers(&self.config.pool_id).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let counts = self.store.count_by_status(&self.config.pool_id).await?;
        Ok(PoolStats {
            pool_id: self.config.pool_id,
            workload_id: self.workload.id.clone(),
            total: counts.total(),
            idle: counts.idle,
            borrowed: counts.claimed,
            min_idle: self.config.min_idle,
            max_size: self.config.max_size,
        })
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
