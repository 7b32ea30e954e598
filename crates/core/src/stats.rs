// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool and registry statistics snapshots.

use serde::{Deserialize, Serialize};

use crate::id::PoolId;

/// Point-in-time counts for one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub pool_id: PoolId,
    pub workload_id: String,
    pub total: u64,
    pub idle: u64,
    pub borrowed: u64,
    pub min_idle: u64,
    pub max_size: u64,
}

/// Aggregate counts across all pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_pools: u64,
    pub total_containers: u64,
    pub active_containers: u64,
    pub idle_containers: u64,
    pub total_tenants: u64,
}
