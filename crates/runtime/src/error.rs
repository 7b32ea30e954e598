// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Driver-level failures, passed through the orchestrator opaquely.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("runtime api error: {0}")]
    Api(String),
    #[error("exec in {container}: {message}")]
    Exec { container: String, message: String },
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
}
