// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend-neutral container creation spec.
//!
//! The container manager builds one of these; each driver translates it
//! into its backend's create call.

use indexmap::IndexMap;

/// One bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

/// One tmpfs mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmpfsSpec {
    pub container_path: String,
    pub size_bytes: u64,
}

/// CPU and memory limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_shares: Option<u64>,
    pub memory_bytes: Option<u64>,
}

impl ResourceLimits {
    /// Parse a human memory string: plain bytes, or `k`/`m`/`g` suffix
    /// (binary multiples), case-insensitive, optional trailing `b`.
    pub fn parse_memory(s: &str) -> Result<u64, String> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Err("empty memory string".into());
        }
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        let suffix = s[digits.len()..].trim_end_matches('b');
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid memory value: {s:?}"))?;
        let multiplier: u64 = match suffix {
            "" => 1,
            "k" => 1024,
            "m" => 1024 * 1024,
            "g" => 1024 * 1024 * 1024,
            other => return Err(format!("unknown memory suffix {other:?} in {s:?}")),
        };
        Ok(value * multiplier)
    }
}

/// Hardening applied to every pooled container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityOpts {
    pub read_only_root: bool,
    pub drop_all_capabilities: bool,
    pub no_new_privileges: bool,
    pub run_as_non_root: bool,
}

impl Default for SecurityOpts {
    fn default() -> Self {
        Self {
            read_only_root: true,
            drop_all_capabilities: true,
            no_new_privileges: true,
            run_as_non_root: true,
        }
    }
}

/// Exec-style health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    /// Probe argv without a `CMD`/`CMD-SHELL` prefix.
    pub argv: Vec<String>,
    /// True when the probe is a shell string rather than an argv.
    pub shell: bool,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub retries: u32,
    pub start_period_ms: Option<u64>,
}

impl HealthCheckSpec {
    /// Normalize a workload-declared probe: strips a leading `CMD` or
    /// `CMD-SHELL` marker and records which form it was.
    pub fn from_test(
        test: &[String],
        interval_ms: u64,
        timeout_ms: u64,
        retries: u32,
        start_period_ms: Option<u64>,
    ) -> Self {
        let (argv, shell) = match test.first().map(String::as_str) {
            Some("CMD-SHELL") => (test[1..].to_vec(), true),
            Some("CMD") => (test[1..].to_vec(), false),
            _ => (test.to_vec(), false),
        };
        Self { argv, shell, interval_ms, timeout_ms, retries, start_period_ms }
    }
}

/// Everything a driver needs to create one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    /// Deterministic runtime name, also used as the hostname.
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: IndexMap<String, String>,
    pub user: Option<String>,
    pub mounts: Vec<MountSpec>,
    pub tmpfs: Vec<TmpfsSpec>,
    pub resources: ResourceLimits,
    pub security: SecurityOpts,
    /// Networks to attach; drivers treat the first as primary.
    pub networks: Vec<String>,
    pub dns: Vec<String>,
    pub labels: IndexMap<String, String>,
    pub health_check: Option<HealthCheckSpec>,
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
