// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rclone subprocess executor.
//!
//! Invocation shape: `rclone <mode> <source> <dest> --progress
//! --stats-one-line [--include PAT] [sink args...] [extra flags] [-v]`.
//! Success is exit code 0; transferred bytes and file counts are parsed
//! from the stats output on a best-effort basis.

use std::process::Stdio;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use hearth_core::sync::SyncOutcome;

use crate::SyncError;

/// Default per-run timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// rclone transfer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcloneMode {
    /// Mirror source to dest (deletes extraneous dest files).
    Sync,
    /// Copy source into dest (no deletions).
    Copy,
    /// Bidirectional sync.
    Bisync,
}

impl RcloneMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RcloneMode::Sync => "sync",
            RcloneMode::Copy => "copy",
            RcloneMode::Bisync => "bisync",
        }
    }
}

/// Failure classification, for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLabel {
    Timeout,
    PermissionDenied,
    NetworkError,
    ToolError,
    Unknown,
}

impl ErrorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLabel::Timeout => "timeout",
            ErrorLabel::PermissionDenied => "permission_denied",
            ErrorLabel::NetworkError => "network_error",
            ErrorLabel::ToolError => "tool_error",
            ErrorLabel::Unknown => "unknown",
        }
    }
}

/// Classify a failed run from its stderr.
pub fn classify_error(stderr: &str, timed_out: bool) -> ErrorLabel {
    if timed_out {
        return ErrorLabel::Timeout;
    }
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("permission denied") || lower.contains("accessdenied") {
        ErrorLabel::PermissionDenied
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorLabel::Timeout
    } else if lower.contains("connection")
        || lower.contains("no such host")
        || lower.contains("network")
        || lower.contains("dial tcp")
    {
        ErrorLabel::NetworkError
    } else if !stderr.is_empty() {
        ErrorLabel::ToolError
    } else {
        ErrorLabel::Unknown
    }
}

/// One planned invocation.
#[derive(Debug, Clone)]
pub struct RclonePlan {
    pub mode: RcloneMode,
    pub source: String,
    pub dest: String,
    /// Provider flags from the sink adapter plus per-sink extras.
    pub sink_args: Vec<String>,
    /// Optional `--include` pattern.
    pub pattern: Option<String>,
    /// `--resync` on bisync runs establishing fresh bidirectional state.
    pub resync: bool,
}

/// Spawns and parses rclone runs.
#[derive(Debug, Clone)]
pub struct RcloneExecutor {
    binary: String,
    timeout: Duration,
    verbose: bool,
}

impl RcloneExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into(), timeout: DEFAULT_TIMEOUT, verbose: false }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Full argv (excluding the binary) for a plan.
    pub fn build_args(&self, plan: &RclonePlan) -> Vec<String> {
        let mut args = vec![
            plan.mode.as_str().to_string(),
            plan.source.clone(),
            plan.dest.clone(),
            "--progress".to_string(),
            "--stats-one-line".to_string(),
        ];
        if plan.resync {
            args.push("--resync".to_string());
        }
        if let Some(pattern) = &plan.pattern {
            args.push("--include".to_string());
            args.push(pattern.clone());
        }
        args.extend(plan.sink_args.iter().cloned());
        if self.verbose {
            args.push("-v".to_string());
        }
        args
    }

    /// Run one transfer to completion (or timeout).
    pub async fn run(&self, plan: &RclonePlan) -> Result<SyncOutcome, SyncError> {
        let args = self.build_args(plan);
        debug!(binary = %self.binary, mode = plan.mode.as_str(), source = %plan.source,
               dest = %plan.dest, "sync run");

        let started = Instant::now();
        let child = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn { binary: self.binary.clone(), source })?;

        let waited = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(io)) => {
                return Ok(SyncOutcome {
                    success: false,
                    errors: vec![format!("{}: {io}", ErrorLabel::ToolError.as_str())],
                    duration_ms,
                    ..Default::default()
                });
            }
            Err(_) => {
                // kill_on_drop reaps the child when the future drops.
                return Ok(SyncOutcome {
                    success: false,
                    errors: vec![format!(
                        "{}: sync exceeded {}s",
                        ErrorLabel::Timeout.as_str(),
                        self.timeout.as_secs()
                    )],
                    duration_ms,
                    ..Default::default()
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (bytes_transferred, files_transferred) = parse_stats(&stdout, &stderr);

        if output.status.success() {
            Ok(SyncOutcome {
                success: true,
                bytes_transferred,
                files_transferred,
                errors: Vec::new(),
                duration_ms,
            })
        } else {
            let label = classify_error(&stderr, false);
            let detail = stderr.lines().last().unwrap_or("sync tool failed").to_string();
            Ok(SyncOutcome {
                success: false,
                bytes_transferred,
                files_transferred,
                errors: vec![format!("{}: {detail}", label.as_str())],
                duration_ms,
            })
        }
    }
}

/// Extract transferred bytes and file count from stats output.
///
/// Accepts both the one-line form (`1.234 MiB / 1.234 MiB, 100%, ...`)
/// and the block form (`Transferred: 12 / 12, 100%`). Missing stats
/// parse as zero.
pub fn parse_stats(stdout: &str, stderr: &str) -> (u64, u64) {
    // Stats land on stderr unless redirected; scan both.
    let combined = format!("{stdout}\n{stderr}");

    #[allow(clippy::unwrap_used)]
    let bytes_re = Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*(B|KiB|MiB|GiB|TiB)\s*/").unwrap();
    #[allow(clippy::unwrap_used)]
    let files_re = Regex::new(r"(?m)^\s*(?:Transferred:)?\s*([0-9]+)\s*/\s*[0-9]+,").unwrap();

    let bytes = bytes_re
        .captures(&combined)
        .and_then(|caps| {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str();
            let multiplier: f64 = match unit {
                "B" => 1.0,
                "KiB" => 1024.0,
                "MiB" => 1024.0 * 1024.0,
                "GiB" => 1024.0 * 1024.0 * 1024.0,
                "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
                _ => return None,
            };
            Some((value * multiplier) as u64)
        })
        .unwrap_or(0);

    let files = files_re
        .captures_iter(&combined)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .last()
        .unwrap_or(0);

    (bytes, files)
}

#[cfg(test)]
#[path = "rclone_tests.rs"]
mod tests;
