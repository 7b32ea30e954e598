// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    fail = { OnError::Fail, 5, 1 },
    cont = { OnError::Continue, 5, 1 },
    retry = { OnError::Retry, 5, 5 },
    retry_floor = { OnError::Retry, 0, 1 },
)]
fn attempts_follow_policy(on_error: OnError, retries: u32, expected: u32) {
    let hook = HookCommand {
        command: vec!["true".into()],
        timeout_ms: 1000,
        on_error,
        retries,
    };
    assert_eq!(hook.attempts(), expected);
}

#[test]
fn hook_command_deserializes_with_defaults() {
    let hook: HookCommand = serde_json::from_str(r#"{"command": ["sh", "-c", "ls"]}"#).unwrap();
    assert_eq!(hook.timeout_ms, 30_000);
    assert_eq!(hook.on_error, OnError::Fail);
    assert_eq!(hook.retries, 1);
}

#[test]
fn on_error_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&OnError::Retry).unwrap(), "\"retry\"");
}

#[test]
fn hook_point_names() {
    assert_eq!(HookPoint::PostClaim.as_str(), "post_claim");
    assert_eq!(HookPoint::PreRelease.as_str(), "pre_release");
}

#[test]
fn result_succeeded_only_on_zero() {
    let mut r = HookResult {
        command: vec!["x".into()],
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
        duration_ms: 1,
        timed_out: false,
    };
    assert!(r.succeeded());
    r.exit_code = -1;
    assert!(!r.succeeded());
}
