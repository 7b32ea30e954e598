// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only activity stream.

use sqlx::FromRow;

use hearth_core::event::{ActivityEvent, ActivityKind};
use hearth_core::id::{ContainerId, PoolId, TenantId};

use crate::{Store, StoreError};

/// Read filter for [`Store::recent_activity`].
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub limit: u32,
    pub offset: u32,
    pub kind: Option<ActivityKind>,
    pub pool_id: Option<PoolId>,
    pub tenant_id: Option<TenantId>,
}

impl ActivityFilter {
    pub fn latest(limit: u32) -> Self {
        Self { limit, ..Default::default() }
    }
}

#[derive(FromRow)]
struct ActivityRow {
    id: i64,
    kind: String,
    pool_id: Option<String>,
    container_id: Option<String>,
    tenant_id: Option<String>,
    message: String,
    timestamp_ms: i64,
    metadata: String,
}

impl ActivityRow {
    fn into_event(self) -> Result<ActivityEvent, StoreError> {
        let kind = ActivityKind::parse(&self.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown activity kind {:?}", self.kind)))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| StoreError::Corrupt(format!("activity metadata: {e}")))?;
        Ok(ActivityEvent {
            id: self.id,
            kind,
            pool_id: self.pool_id.map(PoolId::from_string),
            container_id: self.container_id.map(ContainerId::from_string),
            tenant_id: self.tenant_id.map(TenantId::new),
            message: self.message,
            timestamp_ms: self.timestamp_ms as u64,
            metadata,
        })
    }
}

const COLUMNS: &str = "id, kind, pool_id, container_id, tenant_id, message, timestamp_ms, metadata";

impl Store {
    /// Append one event; returns the assigned monotonic id.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_activity(
        &self,
        kind: ActivityKind,
        pool_id: Option<&PoolId>,
        container_id: Option<&ContainerId>,
        tenant_id: Option<&TenantId>,
        message: &str,
        metadata: &serde_json::Value,
        now_ms: u64,
    ) -> Result<i64, StoreError> {
        let metadata_json =
            serde_json::to_string(metadata).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO activity (kind, pool_id, container_id, tenant_id, message, timestamp_ms, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(kind.as_str())
        .bind(pool_id.map(|p| p.as_str()))
        .bind(container_id.map(|c| c.as_str()))
        .bind(tenant_id.map(|t| t.as_str()))
        .bind(message)
        .bind(now_ms as i64)
        .bind(&metadata_json)
        .fetch_one(self.db())
        .await?;
        Ok(id)
    }

    /// Newest-first read with optional filters.
    pub async fn recent_activity(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let mut sql = format!("SELECT {COLUMNS} FROM activity WHERE 1=1");
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if filter.pool_id.is_some() {
            sql.push_str(" AND pool_id = ?");
        }
        if filter.tenant_id.is_some() {
            sql.push_str(" AND tenant_id = ?");
        }
        sql.push_str(" ORDER BY timestamp_ms DESC, id DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, ActivityRow>(&sql);
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(pool) = &filter.pool_id {
            query = query.bind(pool.as_str());
        }
        if let Some(tenant) = &filter.tenant_id {
            query = query.bind(tenant.as_str());
        }
        let rows = query
            .bind(filter.limit.max(1) as i64)
            .bind(filter.offset as i64)
            .fetch_all(self.db())
            .await?;
        rows.into_iter().map(ActivityRow::into_event).collect()
    }

    /// Delete everything but the newest `keep` events. Returns the
    /// number of deleted rows.
    pub async fn trim_activity(&self, keep: u32) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM activity WHERE id NOT IN \
             (SELECT id FROM activity ORDER BY timestamp_ms DESC, id DESC LIMIT ?)",
        )
        .bind(keep as i64)
        .execute(self.db())
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
