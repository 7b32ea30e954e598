// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync status values shared between the coordinator and the store.

use serde::{Deserialize, Serialize};

use crate::id::TenantId;

/// Direction of a manual or pipeline-triggered sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
    Both,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Upload => "upload",
            SyncDirection::Download => "download",
            SyncDirection::Both => "both",
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate sync state for one (tenant, sync id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(SyncState::Idle),
            "syncing" => Some(SyncState::Syncing),
            "error" => Some(SyncState::Error),
            _ => None,
        }
    }
}

/// One entry in the bounded error ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    pub message: String,
    pub mapping_path: Option<String>,
    pub timestamp_ms: u64,
}

/// Persisted sync status row.
///
/// Invariant: `state == Syncing` iff `pending_count > 0`. A completion
/// that brings `pending_count` to zero clears the error ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub tenant_id: TenantId,
    pub sync_id: String,
    pub state: SyncState,
    pub pending_count: i64,
    pub errors: Vec<SyncErrorEntry>,
    pub last_sync_at_ms: Option<u64>,
}

/// Parsed result of one sync subprocess run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}
