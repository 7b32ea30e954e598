// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook failure specs: a failing post-claim hook rolls the claim back
//! without leaking the container.

use std::time::Duration;

use crate::prelude::*;
use hearth_runtime::ExecResult;

const FAILING_POST_CLAIM: &str =
    "hooks:\n  post_claim:\n    - command: [\"bad\"]\n      on_error: fail\n      retries: 1\n";

#[tokio::test]
async fn post_claim_failure_rolls_back_without_leaking() {
    let harness = Harness::with_workload(
        &Harness::workload_yaml(0, 3, FAILING_POST_CLAIM),
        Duration::from_secs(5),
    )
    .await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");
    harness.driver.push_exec_result(ExecResult { exit_code: 1, ..Default::default() });

    let err = harness.pipeline.claim(&pool, &t1).await.unwrap_err();
    assert!(matches!(err, PoolError::HookAborted { index: 0, .. }), "{err:?}");

    // The tenant holds nothing and the container went back to idle.
    assert!(pool.claimed(&t1).await.unwrap().is_none());
    let stats = pool.stats().await.unwrap();
    assert_eq!(stats.borrowed, 0);
    assert_eq!(stats.idle, 1);

    // And the pool still works for the next claim.
    let retry = harness.pipeline.claim(&pool, &t1).await.unwrap();
    assert!(retry.container.is_claimed_by(&t1));
}

#[tokio::test]
async fn retry_hook_succeeds_on_second_attempt() {
    let yaml = Harness::workload_yaml(
        0,
        3,
        "hooks:\n  post_claim:\n    - command: [\"flaky\"]\n      on_error: retry\n      retries: 2\n",
    );
    let harness = Harness::with_workload(&yaml, Duration::from_secs(5)).await;
    let pool = harness.pool().await;
    harness.driver.push_exec_result(ExecResult { exit_code: 1, ..Default::default() });
    harness.driver.push_exec_result(ExecResult { exit_code: 0, ..Default::default() });

    harness.pipeline.claim(&pool, &tenant("t1")).await.unwrap();
    // Two exec attempts were made against the same container.
    assert_eq!(harness.driver.exec_log().len(), 2);
}

#[tokio::test]
async fn pre_release_failure_never_blocks_release() {
    let yaml = Harness::workload_yaml(
        0,
        3,
        "hooks:\n  pre_release:\n    - command: [\"cleanup\"]\n      on_error: fail\n",
    );
    let harness = Harness::with_workload(&yaml, Duration::from_secs(5)).await;
    let pool = harness.pool().await;
    let t1 = tenant("t1");

    harness.pipeline.claim(&pool, &t1).await.unwrap();
    harness.driver.push_exec_result(ExecResult { exit_code: 9, ..Default::default() });

    let released = harness
        .pipeline
        .release(&pool, &t1, ReleaseOptions::default())
        .await
        .unwrap();
    assert!(released);
    assert!(pool.claimed(&t1).await.unwrap().is_none());

    let failures = harness
        .activity
        .recent(&hearth_store::ActivityFilter {
            limit: 100,
            kind: Some(ActivityKind::HookFailed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
}
