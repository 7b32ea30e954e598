// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload specification types.
//!
//! Field names mirror the YAML surface; durations are declared in
//! milliseconds throughout so the store and timers never convert.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use hearth_core::hook::HookCommand;

/// One pooled workload: image, isolation, volumes, health, pool defaults,
/// sync block, and lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadSpec {
    /// Stable identifier; pool rows reference it.
    pub id: String,
    /// Display name; defaults to `id`.
    #[serde(default)]
    pub name: Option<String>,
    pub image: String,
    /// Optional argv override for the image entrypoint.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub volumes: Volumes,
    /// Environment for the container process.
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// Numeric uid (as digits) or user name. Numeric uids additionally
    /// drive chown of the host-side volume directories.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_true")]
    pub read_only_root: bool,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub dns: Vec<String>,
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub pool: Option<PoolDefaults>,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub hooks: Option<HooksConfig>,
}

fn default_true() -> bool {
    true
}

impl WorkloadSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Numeric uid when `user` is all digits.
    pub fn numeric_uid(&self) -> Option<u32> {
        self.user.as_deref().and_then(|u| u.parse().ok())
    }
}

/// The fixed volume set plus custom named volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Volumes {
    /// Tenant-mutable state, mounted read-write at `/state`.
    #[serde(default)]
    pub state: VolumeSpec,
    /// Mounted read-only at `/secrets`.
    #[serde(default)]
    pub secrets: VolumeSpec,
    /// IPC socket directory, mounted read-write at `/comm`.
    #[serde(default)]
    pub comm: VolumeSpec,
    /// Custom volumes, mounted at `/state/custom/<name>`.
    #[serde(default)]
    pub custom: IndexMap<String, VolumeSpec>,
}

/// One volume declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeSpec {
    /// Directory whose contents seed the volume on create and after wipe.
    #[serde(default)]
    pub seed: Option<PathBuf>,
}

/// Container health check, exec-style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    /// Argv, optionally prefixed with `CMD` or `CMD-SHELL`.
    pub test: Vec<String>,
    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_health_retries")]
    pub retries: u32,
    #[serde(default)]
    pub start_period_ms: Option<u64>,
}

fn default_health_interval_ms() -> u64 {
    5_000
}

fn default_health_timeout_ms() -> u64 {
    3_000
}

fn default_health_retries() -> u32 {
    3
}

/// Per-workload pool sizing and timeout defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolDefaults {
    #[serde(default = "default_min_idle")]
    pub min_idle: u64,
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// When set, claimed containers are auto-released after this much
    /// filesystem inactivity in their state tree.
    #[serde(default)]
    pub file_idle_ttl_ms: Option<u64>,
}

fn default_min_idle() -> u64 {
    1
}

fn default_max_size() -> u64 {
    10
}

fn default_idle_timeout_ms() -> u64 {
    600_000
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            min_idle: default_min_idle(),
            max_size: default_max_size(),
            idle_timeout_ms: default_idle_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            file_idle_ttl_ms: None,
        }
    }
}

/// Remote state sync block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    pub sink: SinkConfig,
    pub mappings: Vec<SyncMapping>,
    #[serde(default)]
    pub policy: SyncPolicy,
}

/// Remote object store addressed through a sink adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Adapter tag, e.g. `s3`.
    #[serde(rename = "type")]
    pub kind: String,
    pub bucket: String,
    /// Sink-relative prefix; `${tenantId}` is interpolated per tenant.
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Credentials; when absent the sync tool falls back to environment
    /// credentials.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Extra flags appended to every sync invocation for this sink.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// One association between a container path and a sink-relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncMapping {
    /// Path relative to the state volume.
    pub container_path: String,
    /// Path relative to the sink prefix.
    pub sink_path: String,
    #[serde(default = "default_mapping_direction")]
    pub direction: MappingDirection,
}

/// Declared direction of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingDirection {
    Upload,
    Download,
    Bisync,
}

fn default_mapping_direction() -> MappingDirection {
    MappingDirection::Bisync
}

/// When syncs run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncPolicy {
    #[serde(default = "default_true_policy")]
    pub on_claim: bool,
    #[serde(default = "default_true_policy")]
    pub on_release: bool,
    #[serde(default)]
    pub manual: bool,
    /// Periodic bidirectional sync while claimed.
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// rclone include pattern applied to every transfer.
    #[serde(default)]
    pub pattern: Option<String>,
}

fn default_true_policy() -> bool {
    true
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            on_claim: true,
            on_release: true,
            manual: false,
            interval_ms: None,
            pattern: None,
        }
    }
}

/// Lifecycle hook lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HooksConfig {
    #[serde(default)]
    pub post_claim: Vec<HookCommand>,
    #[serde(default)]
    pub pre_release: Vec<HookCommand>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
