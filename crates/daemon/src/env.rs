// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven daemon configuration.
//!
//! Every knob has a default; a bare `hearthd` starts with a data dir
//! under the platform data directory and no workloads.

use std::path::PathBuf;
use std::time::Duration;

use hearth_core::duration::parse_duration;

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonEnv {
    /// Root for the store, lock file, and host volume layout.
    pub data_dir: PathBuf,
    /// Directory of workload YAML files, loaded at startup and then
    /// watched for changes.
    pub workloads_dir: Option<PathBuf>,
    /// How often the workload watcher re-scans the directory.
    pub workloads_poll_interval: Duration,
    pub rclone_binary: String,
    pub rclone_timeout: Duration,
    pub rclone_verbose: bool,
    pub activity_max_events: u32,
    pub reaper_poll_interval: Duration,
    /// Grace given to in-flight syncs at shutdown.
    pub shutdown_deadline: Duration,
    pub default_cpu_shares: Option<u64>,
    pub default_memory: Option<String>,
    pub tmpfs_size_bytes: u64,
}

impl Default for DaemonEnv {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("hearth");
        Self {
            data_dir,
            workloads_dir: None,
            workloads_poll_interval: Duration::from_secs(10),
            rclone_binary: "rclone".to_string(),
            rclone_timeout: Duration::from_secs(300),
            rclone_verbose: false,
            activity_max_events: 1_000,
            reaper_poll_interval: Duration::from_secs(5),
            shutdown_deadline: Duration::from_secs(30),
            default_cpu_shares: Some(512),
            default_memory: Some("512m".to_string()),
            tmpfs_size_bytes: 64 * 1024 * 1024,
        }
    }
}

impl DaemonEnv {
    /// Read configuration from `HEARTH_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn load() -> Self {
        let mut env = Self::default();
        if let Some(dir) = var_path("HEARTH_DATA_DIR") {
            env.data_dir = dir;
        }
        env.workloads_dir = var_path("HEARTH_WORKLOADS_DIR");
        if let Some(interval) = var_duration("HEARTH_WORKLOADS_POLL_INTERVAL") {
            env.workloads_poll_interval = interval;
        }
        if let Ok(binary) = std::env::var("HEARTH_RCLONE_BIN") {
            env.rclone_binary = binary;
        }
        if let Some(timeout) = var_duration("HEARTH_RCLONE_TIMEOUT") {
            env.rclone_timeout = timeout;
        }
        env.rclone_verbose = var_bool("HEARTH_RCLONE_VERBOSE").unwrap_or(env.rclone_verbose);
        if let Some(max) = var_number("HEARTH_ACTIVITY_MAX_EVENTS") {
            env.activity_max_events = max as u32;
        }
        if let Some(interval) = var_duration("HEARTH_REAPER_POLL_INTERVAL") {
            env.reaper_poll_interval = interval;
        }
        if let Some(deadline) = var_duration("HEARTH_SHUTDOWN_DEADLINE") {
            env.shutdown_deadline = deadline;
        }
        if let Some(shares) = var_number("HEARTH_DEFAULT_CPU_SHARES") {
            env.default_cpu_shares = Some(shares);
        }
        if let Ok(memory) = std::env::var("HEARTH_DEFAULT_MEMORY") {
            env.default_memory = Some(memory);
        }
        if let Some(size) = var_number("HEARTH_TMPFS_SIZE_BYTES") {
            env.tmpfs_size_bytes = size;
        }
        env
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("hearth.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("hearthd.lock")
    }
}

fn var_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn var_number(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn var_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn var_duration(name: &str) -> Option<Duration> {
    parse_duration(&std::env::var(name).ok()?).ok()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
