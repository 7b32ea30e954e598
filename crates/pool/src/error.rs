// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's failure taxonomy. The HTTP layer maps these kinds onto
//! status codes; internal conflicts (lost conditional updates) never
//! reach here because the scheduler retries them.

use hearth_core::hook::HookPoint;
use hearth_core::id::{ContainerId, PoolId, TenantId};
use hearth_runtime::RuntimeError;
use hearth_store::StoreError;
use hearth_sync::SyncError;
use hearth_workload::ValidationError;

/// Why a hook sequence aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAbortReason {
    NonzeroExit(i32),
    Timeout,
    ExecError,
}

impl std::fmt::Display for HookAbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookAbortReason::NonzeroExit(code) => write!(f, "nonzero-exit ({code})"),
            HookAbortReason::Timeout => f.write_str("timeout"),
            HookAbortReason::ExecError => f.write_str("exec-error"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),
    #[error("pool {pool_id} already exists for workload {workload_id}")]
    PoolExists { pool_id: PoolId, workload_id: String },
    #[error("pool {pool_id} at capacity ({max_size})")]
    PoolCapacity { pool_id: PoolId, max_size: u64 },
    #[error("workload not found: {0}")]
    WorkloadNotFound(String),
    #[error("tenant has no claim: {0}")]
    TenantNotFound(TenantId),
    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),
    #[error(transparent)]
    Workload(#[from] ValidationError),
    #[error("container {container_id} not healthy after {waited_ms}ms")]
    HealthTimeout { container_id: ContainerId, waited_ms: u64 },
    #[error("{point} hook {index} aborted: {reason}")]
    HookAborted { point: HookPoint, index: usize, reason: HookAbortReason },
    #[error("sync failed: {0}")]
    SyncFailed(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
