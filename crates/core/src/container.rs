// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool container records and the claim state machine.

use serde::{Deserialize, Serialize};

use crate::id::{ContainerId, PoolId, TenantId};

/// Container lifecycle status as persisted in the store.
///
/// Transitions: `idle → claimed` (acquire), `claimed → idle` (release),
/// `idle|claimed → stopping` (destroy paths). `stopping` rows are never
/// selected for claims and only leave the store by row deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Idle,
    Claimed,
    Stopping,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Idle => "idle",
            ContainerStatus::Claimed => "claimed",
            ContainerStatus::Stopping => "stopping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(ContainerStatus::Idle),
            "claimed" => Some(ContainerStatus::Claimed),
            "stopping" => Some(ContainerStatus::Stopping),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pooled container row. The store row is canonical; values held in
/// memory are snapshots.
///
/// Invariants: `tenant_id` is `Some` iff `status == Claimed`;
/// `(pool_id, tenant_id)` is unique among claimed rows; `last_tenant_id`
/// survives release and is only cleared by a wipe for a new tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolContainer {
    pub container_id: ContainerId,
    pub pool_id: PoolId,
    pub workload_id: String,
    pub status: ContainerStatus,
    pub tenant_id: Option<TenantId>,
    pub last_tenant_id: Option<TenantId>,
    /// Epoch ms of the last observed activity (claim, release, touch,
    /// reaper-detected filesystem write).
    pub last_activity_ms: u64,
    pub claimed_at_ms: Option<u64>,
    /// Set by the idle reaper while a watch is active.
    pub idle_expires_at_ms: Option<u64>,
    pub created_at_ms: u64,
}

impl PoolContainer {
    /// Deterministic runtime container name for this row.
    pub fn runtime_name(&self) -> String {
        runtime_name(&self.container_id)
    }

    pub fn is_claimed_by(&self, tenant: &TenantId) -> bool {
        self.status == ContainerStatus::Claimed && self.tenant_id.as_ref() == Some(tenant)
    }
}

/// Deterministic runtime name for a container id: `container-<id>`.
///
/// Doubles as the hostname handed back to tenants at claim time.
pub fn runtime_name(id: &ContainerId) -> String {
    format!("container-{}", id)
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
