// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container row operations.
//!
//! The conditional update in [`Store::claim_idle`] is the scheduler's
//! concurrency primitive: two racing claimers both run it, exactly one
//! observes the updated row, the loser gets `Ok(None)` and retries with
//! another candidate.

use sqlx::FromRow;

use hearth_core::container::{ContainerStatus, PoolContainer};
use hearth_core::id::{ContainerId, PoolId, TenantId};

use crate::{Store, StoreError};

/// Per-status row counts for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub idle: u64,
    pub claimed: u64,
    pub stopping: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.idle + self.claimed + self.stopping
    }
}

#[derive(FromRow)]
struct ContainerRow {
    container_id: String,
    pool_id: String,
    workload_id: String,
    status: String,
    tenant_id: Option<String>,
    last_tenant_id: Option<String>,
    last_activity_ms: i64,
    claimed_at_ms: Option<i64>,
    idle_expires_at_ms: Option<i64>,
    created_at_ms: i64,
}

impl ContainerRow {
    fn into_container(self) -> Result<PoolContainer, StoreError> {
        let status = ContainerStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "container {} has unknown status {:?}",
                self.container_id, self.status
            ))
        })?;
        Ok(PoolContainer {
            container_id: ContainerId::from_string(&self.container_id),
            pool_id: PoolId::from_string(&self.pool_id),
            workload_id: self.workload_id,
            status,
            tenant_id: self.tenant_id.map(TenantId::new),
            last_tenant_id: self.last_tenant_id.map(TenantId::new),
            last_activity_ms: self.last_activity_ms as u64,
            claimed_at_ms: self.claimed_at_ms.map(|v| v as u64),
            idle_expires_at_ms: self.idle_expires_at_ms.map(|v| v as u64),
            created_at_ms: self.created_at_ms as u64,
        })
    }
}

const COLUMNS: &str = "container_id, pool_id, workload_id, status, tenant_id, last_tenant_id, \
                       last_activity_ms, claimed_at_ms, idle_expires_at_ms, created_at_ms";

fn rows_into(rows: Vec<ContainerRow>) -> Result<Vec<PoolContainer>, StoreError> {
    rows.into_iter().map(ContainerRow::into_container).collect()
}

impl Store {
    pub async fn insert_container(&self, container: &PoolContainer) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO containers (container_id, pool_id, workload_id, status, tenant_id, \
             last_tenant_id, last_activity_ms, claimed_at_ms, idle_expires_at_ms, created_at_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(container.container_id.as_str())
        .bind(container.pool_id.as_str())
        .bind(&container.workload_id)
        .bind(container.status.as_str())
        .bind(container.tenant_id.as_ref().map(|t| t.as_str()))
        .bind(container.last_tenant_id.as_ref().map(|t| t.as_str()))
        .bind(container.last_activity_ms as i64)
        .bind(container.claimed_at_ms.map(|v| v as i64))
        .bind(container.idle_expires_at_ms.map(|v| v as i64))
        .bind(container.created_at_ms as i64)
        .execute(self.db())
        .await?;
        Ok(())
    }

    pub async fn container(
        &self,
        id: &ContainerId,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE container_id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// Oldest idle row in the pool, if any.
    pub async fn first_idle(&self, pool: &PoolId) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE pool_id = ? AND status = 'idle' \
             ORDER BY created_at_ms ASC LIMIT 1"
        ))
        .bind(pool.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// Idle row previously leased to `tenant` (affinity candidate).
    pub async fn idle_with_last_tenant(
        &self,
        pool: &PoolId,
        tenant: &TenantId,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE pool_id = ? AND status = 'idle' \
             AND last_tenant_id = ? ORDER BY last_activity_ms DESC LIMIT 1"
        ))
        .bind(pool.as_str())
        .bind(tenant.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// The tenant's claimed row in this pool, if any.
    pub async fn claimed(
        &self,
        pool: &PoolId,
        tenant: &TenantId,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE pool_id = ? AND tenant_id = ? \
             AND status = 'claimed'"
        ))
        .bind(pool.as_str())
        .bind(tenant.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// Any claimed row for `tenant` across pools (tenant → pool routing).
    pub async fn claimed_anywhere(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE tenant_id = ? AND status = 'claimed' LIMIT 1"
        ))
        .bind(tenant.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    pub async fn containers_in_pool(
        &self,
        pool: &PoolId,
    ) -> Result<Vec<PoolContainer>, StoreError> {
        let rows: Vec<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE pool_id = ? ORDER BY created_at_ms ASC"
        ))
        .bind(pool.as_str())
        .fetch_all(self.db())
        .await?;
        rows_into(rows)
    }

    /// Claimed rows in a pool (reaper restore after restart).
    pub async fn claimed_in_pool(
        &self,
        pool: &PoolId,
    ) -> Result<Vec<PoolContainer>, StoreError> {
        let rows: Vec<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers WHERE pool_id = ? AND status = 'claimed' \
             ORDER BY created_at_ms ASC"
        ))
        .bind(pool.as_str())
        .fetch_all(self.db())
        .await?;
        rows_into(rows)
    }

    pub async fn all_containers(&self) -> Result<Vec<PoolContainer>, StoreError> {
        let rows: Vec<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM containers ORDER BY created_at_ms ASC"
        ))
        .fetch_all(self.db())
        .await?;
        rows_into(rows)
    }

    pub async fn count_by_status(&self, pool: &PoolId) -> Result<StatusCounts, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM containers WHERE pool_id = ? GROUP BY status",
        )
        .bind(pool.as_str())
        .fetch_all(self.db())
        .await?;
        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status.as_str() {
                "idle" => counts.idle = count as u64,
                "claimed" => counts.claimed = count as u64,
                "stopping" => counts.stopping = count as u64,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Number of distinct tenants currently holding claims.
    pub async fn claimed_tenant_count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT tenant_id) FROM containers WHERE status = 'claimed'",
        )
        .fetch_one(self.db())
        .await?;
        Ok(count as u64)
    }

    /// Conditional claim: transitions `id` to `claimed` for `tenant` only
    /// if the row is still idle. Returns the updated row, or `None` when
    /// another claimer won the race.
    pub async fn claim_idle(
        &self,
        id: &ContainerId,
        tenant: &TenantId,
        now_ms: u64,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "UPDATE containers SET status = 'claimed', tenant_id = ?, last_activity_ms = ?, \
             claimed_at_ms = ? WHERE container_id = ? AND status = 'idle' RETURNING {COLUMNS}"
        ))
        .bind(tenant.as_str())
        .bind(now_ms as i64)
        .bind(now_ms as i64)
        .bind(id.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// Release the tenant's claim in `pool`: back to idle, tenant cleared,
    /// `last_tenant_id` preserved for affinity. Returns the updated row.
    pub async fn release_claim(
        &self,
        pool: &PoolId,
        tenant: &TenantId,
        now_ms: u64,
    ) -> Result<Option<PoolContainer>, StoreError> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "UPDATE containers SET status = 'idle', tenant_id = NULL, last_tenant_id = ?, \
             claimed_at_ms = NULL, idle_expires_at_ms = NULL, last_activity_ms = ? \
             WHERE pool_id = ? AND tenant_id = ? AND status = 'claimed' RETURNING {COLUMNS}"
        ))
        .bind(tenant.as_str())
        .bind(now_ms as i64)
        .bind(pool.as_str())
        .bind(tenant.as_str())
        .fetch_optional(self.db())
        .await?;
        row.map(ContainerRow::into_container).transpose()
    }

    /// Bump `last_activity_ms` on the tenant's claimed row.
    pub async fn touch_claimed(
        &self,
        pool: &PoolId,
        tenant: &TenantId,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE containers SET last_activity_ms = ? \
             WHERE pool_id = ? AND tenant_id = ? AND status = 'claimed'",
        )
        .bind(now_ms as i64)
        .bind(pool.as_str())
        .bind(tenant.as_str())
        .execute(self.db())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Reaper activity reset: refresh both activity and expiry.
    pub async fn touch_watch(
        &self,
        id: &ContainerId,
        now_ms: u64,
        expires_at_ms: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE containers SET last_activity_ms = ?, idle_expires_at_ms = ? \
             WHERE container_id = ?",
        )
        .bind(now_ms as i64)
        .bind(expires_at_ms as i64)
        .bind(id.as_str())
        .execute(self.db())
        .await?;
        Ok(())
    }

    /// Set or clear the reaper expiry deadline.
    pub async fn set_idle_expiry(
        &self,
        id: &ContainerId,
        expires_at_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE containers SET idle_expires_at_ms = ? WHERE container_id = ?")
            .bind(expires_at_ms.map(|v| v as i64))
            .bind(id.as_str())
            .execute(self.db())
            .await?;
        Ok(())
    }

    /// Move a row to `stopping` so no claimer can select it while the
    /// runtime teardown runs. Returns false when the row is gone.
    pub async fn mark_stopping(&self, id: &ContainerId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE containers SET status = 'stopping', tenant_id = NULL \
             WHERE container_id = ?",
        )
        .bind(id.as_str())
        .execute(self.db())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_container(&self, id: &ContainerId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM containers WHERE container_id = ?")
            .bind(id.as_str())
            .execute(self.db())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_pool_containers(&self, pool: &PoolId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM containers WHERE pool_id = ?")
            .bind(pool.as_str())
            .execute(self.db())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "containers_tests.rs"]
mod tests;
