// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery: converge the store with the runtime.
//!
//! The store owns tenant-facing state, the runtime owns container
//! existence. After a restart the two can disagree in both directions:
//! rows without running containers (stale) and managed containers
//! without rows (foreign). Recovery deletes the former and destroys the
//! latter. Failures are logged, never fatal — a half-converged node
//! still starts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use hearth_core::event::ActivityKind;
use hearth_core::id::TenantId;
use hearth_runtime::{labels, RuntimeDriver, RuntimeStatus};
use hearth_store::Store;

use crate::activity::ActivityLog;
use crate::manager::ContainerManager;

/// Counters returned by [`reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Managed containers found in the runtime.
    pub runtime_count: u64,
    /// Store rows deleted for missing/stopped containers.
    pub stale_rows: u64,
    /// Running managed containers destroyed for having no row.
    pub foreign_destroyed: u64,
    /// Reservation-style affinity rows removed (none in this scheme).
    pub expired_reservations: u64,
}

/// Run the reconciliation. Called once at startup before fill loops
/// resume.
pub async fn reconcile(
    store: &Store,
    driver: &Arc<dyn RuntimeDriver>,
    manager: &ContainerManager,
    activity: &ActivityLog,
) -> RecoveryReport {
    let mut report = RecoveryReport::default();

    let mut filters = HashMap::new();
    filters.insert(labels::MANAGED.to_string(), "true".to_string());
    let managed = match driver.list_containers(&filters).await {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "recovery: runtime list failed; skipping reconciliation");
            return report;
        }
    };
    report.runtime_count = managed.len() as u64;

    // Pass 1: remove non-running managed containers, collect the
    // running set keyed by our container-id label.
    let mut running: HashSet<String> = HashSet::new();
    for info in &managed {
        let container_id = info.labels.get(labels::CONTAINER_ID).cloned().unwrap_or_default();
        if info.status == RuntimeStatus::Running {
            running.insert(container_id);
        } else {
            info!(name = %info.name, "recovery: removing stopped managed container");
            if let Err(e) = driver.remove_container(&info.name).await {
                warn!(name = %info.name, error = %e, "recovery: remove failed");
            }
        }
    }

    // Pass 2: drop store rows whose container is not running, plus
    // their sync status and host directories.
    let rows = match store.all_containers().await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "recovery: row scan failed");
            return report;
        }
    };
    let mut known_ids: HashSet<String> = HashSet::new();
    for row in &rows {
        if running.contains(row.container_id.as_str()) {
            known_ids.insert(row.container_id.to_string());
            continue;
        }
        info!(container_id = %row.container_id, status = %row.status,
              "recovery: deleting stale row");
        if let Err(e) = store.delete_container(&row.container_id).await {
            warn!(container_id = %row.container_id, error = %e, "recovery: row delete failed");
            continue;
        }
        report.stale_rows += 1;
        manager.remove_host_dirs(&row.container_id);
        if let Some(tenant) = &row.tenant_id {
            cleanup_sync_status(store, tenant, &row.workload_id).await;
        }
    }

    // Pass 3: destroy running managed containers the store has never
    // heard of.
    for info in &managed {
        if info.status != RuntimeStatus::Running {
            continue;
        }
        let container_id = info.labels.get(labels::CONTAINER_ID).cloned().unwrap_or_default();
        if known_ids.contains(&container_id) {
            continue;
        }
        info!(name = %info.name, "recovery: destroying foreign container");
        match driver.destroy_container(&info.name, 2).await {
            Ok(()) => report.foreign_destroyed += 1,
            Err(e) => warn!(name = %info.name, error = %e, "recovery: destroy failed"),
        }
    }

    // Pass 4: reservation-style affinity would be pruned here; affinity
    // lives on `last_tenant_id`, so there is nothing to expire.

    info!(
        runtime_count = report.runtime_count,
        stale_rows = report.stale_rows,
        foreign_destroyed = report.foreign_destroyed,
        "recovery complete"
    );
    activity
        .event(
            ActivityKind::RecoveryCompleted,
            format!(
                "recovery: {} runtime, {} stale rows, {} foreign destroyed",
                report.runtime_count, report.stale_rows, report.foreign_destroyed
            ),
        )
        .metadata(serde_json::json!({
            "runtime_count": report.runtime_count,
            "stale_rows": report.stale_rows,
            "foreign_destroyed": report.foreign_destroyed,
            "expired_reservations": report.expired_reservations,
        }))
        .emit_logged()
        .await;

    report
}

async fn cleanup_sync_status(store: &Store, tenant: &TenantId, workload_id: &str) {
    if let Err(e) = store.delete_sync_status(tenant, workload_id).await {
        warn!(tenant = %tenant, workload_id, error = %e, "recovery: sync status cleanup failed");
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
