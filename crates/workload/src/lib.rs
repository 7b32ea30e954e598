// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-workload: workload specifications and their in-memory registry.
//!
//! A workload spec declares the container image, volumes, health check,
//! pool defaults, sync block, and lifecycle hooks for one pooled
//! workload. Specs are loaded from YAML (with `${VAR}` environment
//! interpolation), validated field by field, and treated as immutable
//! for the lifetime of any pool built from them.

pub mod load;
pub mod registry;
pub mod types;
pub mod validate;

pub use load::{from_yaml_str, load_dir, LoadError};
pub use registry::{WorkloadChange, WorkloadRegistry};
pub use types::{
    HealthCheckConfig, HooksConfig, MappingDirection, PoolDefaults, SinkConfig, SyncConfig,
    SyncMapping, SyncPolicy, VolumeSpec, Volumes, WorkloadSpec,
};
pub use validate::{ValidationError, ValidationIssue};
