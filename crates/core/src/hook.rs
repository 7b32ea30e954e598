// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle hook commands and their execution results.

use serde::{Deserialize, Serialize};

/// Where in the claim/release pipeline a hook list runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    PostClaim,
    PreRelease,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PostClaim => "post_claim",
            HookPoint::PreRelease => "pre_release",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure policy for a single hook command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Abort the hook sequence.
    #[default]
    Fail,
    /// Log and proceed to the next hook.
    Continue,
    /// Re-run up to `retries` attempts, then abort if still failing.
    Retry,
}

/// One in-container command executed at a hook point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookCommand {
    /// Argv executed inside the container.
    pub command: Vec<String>,
    #[serde(default = "default_hook_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub on_error: OnError,
    /// Attempt count when `on_error` is `retry`. Minimum 1.
    #[serde(default = "default_hook_retries")]
    pub retries: u32,
}

fn default_hook_timeout_ms() -> u64 {
    30_000
}

fn default_hook_retries() -> u32 {
    1
}

impl HookCommand {
    /// Attempts to make for this hook under its failure policy.
    pub fn attempts(&self) -> u32 {
        match self.on_error {
            OnError::Retry => self.retries.max(1),
            _ => 1,
        }
    }
}

/// Result of one hook command (last attempt when retried).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    pub command: Vec<String>,
    /// `-1` for timeouts and exec failures.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl HookResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of running a hook list sequentially.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookRunOutcome {
    pub aborted: bool,
    /// Index of the aborting hook when `aborted`.
    pub aborted_at: Option<usize>,
    pub results: Vec<HookResult>,
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
