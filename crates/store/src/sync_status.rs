// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync status transitions.
//!
//! `pending_count` tracks started-minus-completed runs; the state column
//! is derived from it on every transition so the invariant
//! `state = syncing ⇔ pending_count > 0` holds at rest.

use sqlx::FromRow;

use hearth_core::id::TenantId;
use hearth_core::sync::{SyncErrorEntry, SyncState, SyncStatus};

use crate::{Store, StoreError};

/// Bound on the persisted error ring.
pub const MAX_SYNC_ERRORS: usize = 10;

#[derive(FromRow)]
struct SyncRow {
    tenant_id: String,
    sync_id: String,
    state: String,
    pending_count: i64,
    errors: String,
    last_sync_at_ms: Option<i64>,
}

impl SyncRow {
    fn into_status(self) -> Result<SyncStatus, StoreError> {
        let state = SyncState::parse(&self.state).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "sync status ({}, {}) has unknown state {:?}",
                self.tenant_id, self.sync_id, self.state
            ))
        })?;
        let errors: Vec<SyncErrorEntry> = serde_json::from_str(&self.errors)
            .map_err(|e| StoreError::Corrupt(format!("sync error ring: {e}")))?;
        Ok(SyncStatus {
            tenant_id: TenantId::new(self.tenant_id),
            sync_id: self.sync_id,
            state,
            pending_count: self.pending_count,
            errors,
            last_sync_at_ms: self.last_sync_at_ms.map(|v| v as u64),
        })
    }
}

const COLUMNS: &str = "tenant_id, sync_id, state, pending_count, errors, last_sync_at_ms";

impl Store {
    /// Record a sync start: increments `pending_count`, state `syncing`.
    pub async fn sync_started(
        &self,
        tenant: &TenantId,
        sync_id: &str,
    ) -> Result<SyncStatus, StoreError> {
        let row: SyncRow = sqlx::query_as(&format!(
            "INSERT INTO sync_status (tenant_id, sync_id, state, pending_count) \
             VALUES (?, ?, 'syncing', 1) \
             ON CONFLICT (tenant_id, sync_id) DO UPDATE SET \
               pending_count = pending_count + 1, state = 'syncing' \
             RETURNING {COLUMNS}"
        ))
        .bind(tenant.as_str())
        .bind(sync_id)
        .fetch_one(self.db())
        .await?;
        row.into_status()
    }

    /// Record a sync completion. On success with no remaining pending
    /// runs the error ring is cleared; a failure appends to the ring
    /// (bounded) and leaves state `error` once the run count drains.
    pub async fn sync_completed(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        now_ms: u64,
        error: Option<SyncErrorEntry>,
    ) -> Result<SyncStatus, StoreError> {
        // Single-process writer: read-modify-write without a transaction
        // race. The coordinator is the only caller.
        let existing: Option<SyncRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM sync_status WHERE tenant_id = ? AND sync_id = ?"
        ))
        .bind(tenant.as_str())
        .bind(sync_id)
        .fetch_optional(self.db())
        .await?;

        let current = match existing {
            Some(row) => row.into_status()?,
            None => SyncStatus {
                tenant_id: tenant.clone(),
                sync_id: sync_id.to_string(),
                state: SyncState::Idle,
                pending_count: 0,
                errors: Vec::new(),
                last_sync_at_ms: None,
            },
        };

        let pending = (current.pending_count - 1).max(0);
        let mut errors = current.errors;
        let failed = error.is_some();
        if let Some(entry) = error {
            errors.push(entry);
            let overflow = errors.len().saturating_sub(MAX_SYNC_ERRORS);
            errors.drain(..overflow);
        }

        let state = if pending > 0 {
            SyncState::Syncing
        } else if failed {
            SyncState::Error
        } else {
            SyncState::Idle
        };
        // A clean drain wipes the slate.
        if pending == 0 && !failed {
            errors.clear();
        }

        let errors_json =
            serde_json::to_string(&errors).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let last_sync = if failed { current.last_sync_at_ms } else { Some(now_ms) };

        let row: SyncRow = sqlx::query_as(&format!(
            "INSERT INTO sync_status (tenant_id, sync_id, state, pending_count, errors, last_sync_at_ms) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (tenant_id, sync_id) DO UPDATE SET \
               state = excluded.state, pending_count = excluded.pending_count, \
               errors = excluded.errors, last_sync_at_ms = excluded.last_sync_at_ms \
             RETURNING {COLUMNS}"
        ))
        .bind(tenant.as_str())
        .bind(sync_id)
        .bind(state.as_str())
        .bind(pending)
        .bind(&errors_json)
        .bind(last_sync.map(|v| v as i64))
        .fetch_one(self.db())
        .await?;
        row.into_status()
    }

    pub async fn sync_statuses_for_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SyncStatus>, StoreError> {
        let rows: Vec<SyncRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM sync_status WHERE tenant_id = ? ORDER BY sync_id"
        ))
        .bind(tenant.as_str())
        .fetch_all(self.db())
        .await?;
        rows.into_iter().map(SyncRow::into_status).collect()
    }

    pub async fn sync_statuses_in_state(
        &self,
        state: SyncState,
    ) -> Result<Vec<SyncStatus>, StoreError> {
        let rows: Vec<SyncRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM sync_status WHERE state = ? ORDER BY tenant_id, sync_id"
        ))
        .bind(state.as_str())
        .fetch_all(self.db())
        .await?;
        rows.into_iter().map(SyncRow::into_status).collect()
    }

    pub async fn delete_sync_status(
        &self,
        tenant: &TenantId,
        sync_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sync_status WHERE tenant_id = ? AND sync_id = ?")
            .bind(tenant.as_str())
            .bind(sync_id)
            .execute(self.db())
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
#[path = "sync_status_tests.rs"]
mod tests;
