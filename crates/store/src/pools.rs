// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted pool parameters, read back during recovery.

use sqlx::FromRow;

use hearth_core::id::PoolId;

use crate::{Store, StoreError};

/// Pool configuration row.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRecord {
    pub pool_id: PoolId,
    pub workload_id: String,
    pub min_idle: u64,
    pub max_size: u64,
    pub idle_timeout_ms: u64,
    pub eviction_interval_ms: u64,
    pub acquire_timeout_ms: u64,
    pub file_idle_ttl_ms: Option<u64>,
    pub networks: Option<Vec<String>>,
    pub created_at_ms: u64,
}

#[derive(FromRow)]
struct PoolRow {
    pool_id: String,
    workload_id: String,
    min_idle: i64,
    max_size: i64,
    idle_timeout_ms: i64,
    eviction_interval_ms: i64,
    acquire_timeout_ms: i64,
    file_idle_ttl_ms: Option<i64>,
    networks: Option<String>,
    created_at_ms: i64,
}

impl PoolRow {
    fn into_record(self) -> Result<PoolRecord, StoreError> {
        let networks = self
            .networks
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("pool networks: {e}")))?;
        Ok(PoolRecord {
            pool_id: PoolId::from_string(&self.pool_id),
            workload_id: self.workload_id,
            min_idle: self.min_idle as u64,
            max_size: self.max_size as u64,
            idle_timeout_ms: self.idle_timeout_ms as u64,
            eviction_interval_ms: self.eviction_interval_ms as u64,
            acquire_timeout_ms: self.acquire_timeout_ms as u64,
            file_idle_ttl_ms: self.file_idle_ttl_ms.map(|v| v as u64),
            networks,
            created_at_ms: self.created_at_ms as u64,
        })
    }
}

const COLUMNS: &str = "pool_id, workload_id, min_idle, max_size, idle_timeout_ms, \
                       eviction_interval_ms, acquire_timeout_ms, file_idle_ttl_ms, networks, \
                       created_at_ms";

impl Store {
    pub async fn upsert_pool(&self, record: &PoolRecord) -> Result<(), StoreError> {
        let networks = record
            .networks
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT INTO pools (pool_id, workload_id, min_idle, max_size, idle_timeout_ms, \
             eviction_interval_ms, acquire_timeout_ms, file_idle_ttl_ms, networks, created_at_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (pool_id) DO UPDATE SET \
               workload_id = excluded.workload_id, min_idle = excluded.min_idle, \
               max_size = excluded.max_size, idle_timeout_ms = excluded.idle_timeout_ms, \
               eviction_interval_ms = excluded.eviction_interval_ms, \
               acquire_timeout_ms = excluded.acquire_timeout_ms, \
               file_idle_ttl_ms = excluded.file_idle_ttl_ms, networks = excluded.networks",
        )
        .bind(record.pool_id.as_str())
        .bind(&record.workload_id)
        .bind(record.min_idle as i64)
        .bind(record.max_size as i64)
        .bind(record.idle_timeout_ms as i64)
        .bind(record.eviction_interval_ms as i64)
        .bind(record.acquire_timeout_ms as i64)
        .bind(record.file_idle_ttl_ms.map(|v| v as i64))
        .bind(networks)
        .bind(record.created_at_ms as i64)
        .execute(self.db())
        .await?;
        Ok(())
    }

    pub async fn pools(&self) -> Result<Vec<PoolRecord>, StoreError> {
        let rows: Vec<PoolRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM pools ORDER BY created_at_ms ASC"))
                .fetch_all(self.db())
                .await?;
        rows.into_iter().map(PoolRow::into_record).collect()
    }

    pub async fn delete_pool(&self, pool: &PoolId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pools WHERE pool_id = ?")
            .bind(pool.as_str())
            .execute(self.db())
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
#[path = "pools_tests.rs"]
mod tests;
