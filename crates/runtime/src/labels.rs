// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label keys stamped on every managed container.
//!
//! Recovery identifies orchestrator-owned containers by
//! `MANAGED = "true"` and reads the rest back to map runtime objects to
//! store rows.

pub const MANAGED: &str = "hearth.managed";
pub const CONTAINER_ID: &str = "hearth.container-id";
pub const POOL_ID: &str = "hearth.pool-id";
pub const WORKLOAD_ID: &str = "hearth.workload-id";
pub const CREATED_AT: &str = "hearth.created-at";
