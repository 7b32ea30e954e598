// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-sync: directional file sync between container volumes and
//! remote object storage.
//!
//! Transfer itself is delegated to an external rclone subprocess; this
//! crate owns flag construction, stats parsing, the sink adapter
//! registry, and the coordinator that enforces at-most-one concurrent
//! sync per (tenant, mapping).

pub mod coordinator;
pub mod rclone;
pub mod sink;

pub use coordinator::{MappingReport, MappingRun, SyncCoordinator};
pub use rclone::{ErrorLabel, RcloneExecutor, RcloneMode};
pub use sink::{S3Adapter, SinkAdapter, SinkRegistry};

/// Failures surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no sink adapter registered for type {0:?}")]
    UnknownSink(String),
    #[error("failed to spawn sync tool {binary:?}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] hearth_store::StoreError),
}
