// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool registry: creates and destroys pools, routes tenants, and
//! aggregates stats. One pool per workload.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{info, warn};

use hearth_core::event::ActivityKind;
use hearth_core::id::{PoolId, TenantId};
use hearth_core::stats::RegistryStats;
use hearth_store::{PoolRecord, Store};
use hearth_workload::WorkloadRegistry;

use crate::activity::ActivityLog;
use crate::error::PoolError;
use crate::manager::ContainerManager;
use crate::pipeline::ClaimPipeline;
use crate::reaper::IdleReaper;
use crate::scheduler::{PoolConfig, PoolScheduler};

/// Owns the `pool_id → scheduler` map.
pub struct PoolRegistry {
    store: Store,
    manager: Arc<ContainerManager>,
    activity: Arc<ActivityLog>,
    workloads: Arc<WorkloadRegistry>,
    pools: Arc<RwLock<HashMap<PoolId, Arc<PoolScheduler>>>>,
}

impl PoolRegistry {
    pub fn new(
        store: Store,
        manager: Arc<ContainerManager>,
        activity: Arc<ActivityLog>,
        workloads: Arc<WorkloadRegistry>,
    ) -> Self {
        Self { store, manager, activity, workloads, pools: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Create a pool for a registered workload and start its fill loop.
    /// Refuses a second pool for the same workload.
    pub async fn create_pool(&self, workload_id: &str) -> Result<Arc<PoolScheduler>, PoolError> {
        let workload = self
            .workloads
            .get(workload_id)
            .ok_or_else(|| PoolError::WorkloadNotFound(workload_id.to_string()))?;

        if let Some(existing) = self.pool_for_workload(workload_id) {
            return Err(PoolError::PoolExists {
                pool_id: *existing.pool_id(),
                workload_id: workload_id.to_string(),
            });
        }

        let pool_id = PoolId::new();
        let config = PoolConfig::from_workload(pool_id, &workload);
        self.persist(&config, workload_id).await?;

        let scheduler = Arc::new(PoolScheduler::new(
            workload,
            config,
            self.store.clone(),
            self.manager.clone(),
            self.activity.clone(),
        ));
        scheduler.start();
        self.pools.write().insert(pool_id, scheduler.clone());

        info!(pool_id = %pool_id, workload_id, "pool created");
        self.activity
            .event(ActivityKind::PoolCreated, format!("pool created for {workload_id}"))
            .pool(&pool_id)
            .emit_logged()
            .await;
        Ok(scheduler)
    }

    /// Rebuild a pool from its persisted record (startup). Containers
    /// surviving recovery are adopted, not recreated.
    pub fn resume_pool(&self, record: &PoolRecord) -> Result<Arc<PoolScheduler>, PoolError> {
        let workload = self
            .workloads
            .get(&record.workload_id)
            .ok_or_else(|| PoolError::WorkloadNotFound(record.workload_id.clone()))?;

        let config = PoolConfig {
            pool_id: record.pool_id,
            min_idle: record.min_idle,
            max_size: record.max_size,
            idle_timeout_ms: record.idle_timeout_ms,
            eviction_interval_ms: record.eviction_interval_ms,
            acquire_timeout_ms: record.acquire_timeout_ms,
            networks: record.networks.clone(),
            file_idle_ttl_ms: record.file_idle_ttl_ms,
        };
        let scheduler = Arc::new(PoolScheduler::new(
            workload,
            config,
            self.store.clone(),
            self.manager.clone(),
            self.activity.clone(),
        ));
        scheduler.start();
        self.pools.write().insert(record.pool_id, scheduler.clone());
        info!(pool_id = %record.pool_id, workload_id = %record.workload_id, "pool resumed");
        Ok(scheduler)
    }

    /// Drain and remove a pool.
    pub async fn destroy_pool(&self, pool_id: &PoolId) -> Result<(), PoolError> {
        let scheduler = self
            .pools
            .write()
            .remove(pool_id)
            .ok_or(PoolError::PoolNotFound(*pool_id))?;
        scheduler.drain().await?;
        self.store.delete_pool(pool_id).await?;
        self.activity
            .event(ActivityKind::PoolDestroyed, "pool destroyed")
            .pool(pool_id)
            .emit_logged()
            .await;
        Ok(())
    }

    /// Stop every fill loop, preserving rows and containers for
    /// recovery.
    pub fn shutdown(&self) {
        for scheduler in self.pools.read().values() {
            scheduler.stop();
        }
    }

    pub fn get(&self, pool_id: &PoolId) -> Option<Arc<PoolScheduler>> {
        self.pools.read().get(pool_id).cloned()
    }

    pub fn pool_for_workload(&self, workload_id: &str) -> Option<Arc<PoolScheduler>> {
        self.pools
            .read()
            .values()
            .find(|s| s.workload().id == workload_id)
            .cloned()
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<_> = self.pools.read().keys().copied().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Route a tenant to the pool where it currently holds a claim.
    pub async fn find_claim(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Arc<PoolScheduler>>, PoolError> {
        let Some(row) = self.store.claimed_anywhere(tenant).await? else {
            return Ok(None);
        };
        Ok(self.get(&row.pool_id))
    }

    /// Aggregate stats across every pool.
    pub async fn stats(&self) -> Result<RegistryStats, PoolError> {
        let schedulers: Vec<_> = self.pools.read().values().cloned().collect();
        let mut stats = RegistryStats { total_pools: schedulers.len() as u64, ..Default::default() };
        for scheduler in schedulers {
            let pool = scheduler.stats().await?;
            stats.total_containers += pool.total;
            stats.active_containers += pool.borrowed;
            stats.idle_containers += pool.idle;
        }
        stats.total_tenants = self.store.claimed_tenant_count().await?;
        Ok(stats)
    }

    /// Bind the reaper's expiry callback to the release pipeline. Weak
    /// references keep the reaper from owning its owners.
    pub fn bind_reaper(&self, reaper: &IdleReaper, pipeline: &Arc<ClaimPipeline>) {
        let pools: Weak<RwLock<HashMap<PoolId, Arc<PoolScheduler>>>> =
            Arc::downgrade(&self.pools);
        let pipeline: Weak<ClaimPipeline> = Arc::downgrade(pipeline);
        reaper.bind_expiry(Arc::new(move |container_id, tenant, pool_id| {
            let pools = pools.clone();
            let pipeline = pipeline.clone();
            Box::pin(async move {
                let (Some(pools), Some(pipeline)) = (pools.upgrade(), pipeline.upgrade()) else {
                    return;
                };
                let scheduler = pools.read().get(&pool_id).cloned();
                let Some(scheduler) = scheduler else {
                    warn!(pool_id = %pool_id, "expiry for unknown pool");
                    return;
                };
                if let Err(e) = pipeline.expire(&scheduler, &tenant).await {
                    warn!(container_id = %container_id, tenant = %tenant, error = %e,
                          "expiry release failed");
                }
            })
        }));
    }

    /// Restore reaper watches for every claimed row in pools with a
    /// file-idle TTL (startup, after recovery).
    pub async fn restore_watches(&self, reaper: &IdleReaper) -> Result<u64, PoolError> {
        let schedulers: Vec<_> = self.pools.read().values().cloned().collect();
        let mut restored = 0;
        for scheduler in schedulers {
            let Some(ttl) = scheduler.config().file_idle_ttl_ms else {
                continue;
            };
            for row in self.store.claimed_in_pool(scheduler.pool_id()).await? {
                let Some(tenant) = row.tenant_id.clone() else {
                    continue;
                };
                reaper
                    .restore(
                        &row.container_id,
                        &tenant,
                        scheduler.pool_id(),
                        &self.manager.state_dir(&row.container_id),
                        ttl,
                    )
                    .await;
                restored += 1;
            }
        }
        Ok(restored)
    }

    async fn persist(&self, config: &PoolConfig, workload_id: &str) -> Result<(), PoolError> {
        let record = PoolRecord {
            pool_id: config.pool_id,
            workload_id: workload_id.to_string(),
            min_idle: config.min_idle,
            max_size: config.max_size,
            idle_timeout_ms: config.idle_timeout_ms,
            eviction_interval_ms: config.eviction_interval_ms,
            acquire_timeout_ms: config.acquire_timeout_ms,
            file_idle_ttl_ms: config.file_idle_ttl_ms,
            networks: config.networks.clone(),
            created_at_ms: {
                use hearth_core::clock::{Clock, SystemClock};
                SystemClock.epoch_ms()
            },
        };
        Ok(self.store.upsert_pool(&record).await?)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
