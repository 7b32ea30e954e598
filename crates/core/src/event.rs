// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity stream events.
//!
//! Events are facts appended to the capped activity log; components fan
//! them out to in-process subscribers. They carry display data, not
//! authoritative state — the store rows stay canonical.

use serde::{Deserialize, Serialize};

use crate::id::{ContainerId, PoolId, TenantId};

/// Event type tags, stable across the wire and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PoolCreated,
    PoolDestroyed,
    PoolScaled,
    ContainerCreated,
    ContainerClaimed,
    ContainerReleased,
    ContainerDestroyed,
    ContainerExpired,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
    HookStarted,
    HookCompleted,
    HookFailed,
    RecoveryCompleted,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PoolCreated => "pool.created",
            ActivityKind::PoolDestroyed => "pool.destroyed",
            ActivityKind::PoolScaled => "pool.scaled",
            ActivityKind::ContainerCreated => "container.created",
            ActivityKind::ContainerClaimed => "container.claimed",
            ActivityKind::ContainerReleased => "container.released",
            ActivityKind::ContainerDestroyed => "container.destroyed",
            ActivityKind::ContainerExpired => "container.expired",
            ActivityKind::SyncStarted => "sync.started",
            ActivityKind::SyncCompleted => "sync.completed",
            ActivityKind::SyncFailed => "sync.failed",
            ActivityKind::HookStarted => "hook.started",
            ActivityKind::HookCompleted => "hook.completed",
            ActivityKind::HookFailed => "hook.failed",
            ActivityKind::RecoveryCompleted => "recovery.completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pool.created" => ActivityKind::PoolCreated,
            "pool.destroyed" => ActivityKind::PoolDestroyed,
            "pool.scaled" => ActivityKind::PoolScaled,
            "container.created" => ActivityKind::ContainerCreated,
            "container.claimed" => ActivityKind::ContainerClaimed,
            "container.released" => ActivityKind::ContainerReleased,
            "container.destroyed" => ActivityKind::ContainerDestroyed,
            "container.expired" => ActivityKind::ContainerExpired,
            "sync.started" => ActivityKind::SyncStarted,
            "sync.completed" => ActivityKind::SyncCompleted,
            "sync.failed" => ActivityKind::SyncFailed,
            "hook.started" => ActivityKind::HookStarted,
            "hook.completed" => ActivityKind::HookCompleted,
            "hook.failed" => ActivityKind::HookFailed,
            "recovery.completed" => ActivityKind::RecoveryCompleted,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended activity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Monotonic id assigned by the store at insert.
    pub id: i64,
    pub kind: ActivityKind,
    pub pool_id: Option<PoolId>,
    pub container_id: Option<ContainerId>,
    pub tenant_id: Option<TenantId>,
    pub message: String,
    pub timestamp_ms: u64,
    /// Free-form event payload (sync byte counts, hook exit codes, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
