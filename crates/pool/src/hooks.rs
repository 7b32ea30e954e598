// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle hook execution.
//!
//! Hooks run sequentially inside the container via driver exec, each
//! attempt under its own deadline. Timeouts and exec failures map to
//! exit code −1 so downstream handling only looks at the exit code.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use hearth_core::container::PoolContainer;
use hearth_core::event::ActivityKind;
use hearth_core::hook::{HookCommand, HookPoint, HookResult, HookRunOutcome, OnError};
use hearth_runtime::RuntimeDriver;

use crate::activity::ActivityLog;
use crate::error::HookAbortReason;

/// Executes hook lists against one container.
pub struct HookRunner {
    driver: Arc<dyn RuntimeDriver>,
    activity: Arc<ActivityLog>,
}

impl HookRunner {
    pub fn new(driver: Arc<dyn RuntimeDriver>, activity: Arc<ActivityLog>) -> Self {
        Self { driver, activity }
    }

    /// Run a hook list sequentially; stops at the first abort per the
    /// hook's failure policy.
    pub async fn run(
        &self,
        point: HookPoint,
        hooks: &[HookCommand],
        container: &PoolContainer,
    ) -> HookRunOutcome {
        let name = container.runtime_name();
        let mut results = Vec::with_capacity(hooks.len());

        for (index, hook) in hooks.iter().enumerate() {
            self.activity
                .event(ActivityKind::HookStarted, format!("{point} hook {index}"))
                .pool(&container.pool_id)
                .container(&container.container_id)
                .metadata(serde_json::json!({
                    "point": point.as_str(),
                    "index": index,
                    "command": hook.command,
                }))
                .emit_logged()
                .await;

            let mut result = self.exec_once(&name, hook).await;
            for _ in 1..hook.attempts() {
                if result.succeeded() {
                    break;
                }
                result = self.exec_once(&name, hook).await;
            }

            if result.succeeded() {
                self.activity
                    .event(ActivityKind::HookCompleted, format!("{point} hook {index} completed"))
                    .pool(&container.pool_id)
                    .container(&container.container_id)
                    .metadata(serde_json::json!({ "index": index, "duration_ms": result.duration_ms }))
                    .emit_logged()
                    .await;
                results.push(result);
                continue;
            }

            let reason = if result.timed_out {
                "timed out".to_string()
            } else {
                format!("exited {}", result.exit_code)
            };
            warn!(point = %point, index, reason = %reason, "hook failed");
            self.activity
                .event(ActivityKind::HookFailed, format!("{point} hook {index} {reason}"))
                .pool(&container.pool_id)
                .container(&container.container_id)
                .metadata(serde_json::json!({
                    "index": index,
                    "exit_code": result.exit_code,
                    "timed_out": result.timed_out,
                }))
                .emit_logged()
                .await;

            let abort = matches!(hook.on_error, OnError::Fail | OnError::Retry);
            results.push(result);
            if abort {
                return HookRunOutcome { aborted: true, aborted_at: Some(index), results };
            }
            // OnError::Continue: proceed to the next hook.
        }

        HookRunOutcome { aborted: false, aborted_at: None, results }
    }

    async fn exec_once(&self, name: &str, hook: &HookCommand) -> HookResult {
        let deadline = Duration::from_millis(hook.timeout_ms);
        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.driver.exec(name, &hook.command)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(exec)) => {
                debug!(command = ?hook.command, exit_code = exec.exit_code, "hook exec done");
                HookResult {
                    command: hook.command.clone(),
                    exit_code: exec.exit_code,
                    stdout: exec.stdout,
                    stderr: exec.stderr,
                    duration_ms,
                    timed_out: false,
                }
            }
            Ok(Err(e)) => HookResult {
                command: hook.command.clone(),
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
                duration_ms,
                timed_out: false,
            },
            Err(_) => HookResult {
                command: hook.command.clone(),
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("Hook timed out after {}ms", hook.timeout_ms),
                duration_ms,
                timed_out: true,
            },
        }
    }
}

/// Abort reason for the error taxonomy, derived from the failing result.
pub fn abort_reason(outcome: &HookRunOutcome) -> HookAbortReason {
    let failing = outcome.aborted_at.and_then(|i| outcome.results.get(i));
    match failing {
        Some(result) if result.timed_out => HookAbortReason::Timeout,
        Some(result) if result.exit_code == -1 => HookAbortReason::ExecError,
        Some(result) => HookAbortReason::NonzeroExit(result.exit_code),
        None => HookAbortReason::ExecError,
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
