// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-store: durable single-node state on embedded SQLite.
//!
//! The store is the single source of truth for tenant-facing state
//! (container rows, sync status, activity log, persisted pool
//! parameters). The container runtime stays the source of truth for
//! container existence; the recovery reconciler converges the two after
//! a restart.
//!
//! Concurrency model: one process, WAL journal, writers serialized by
//! SQLite. The scheduler's only critical sections are the conditional
//! updates in [`Store::claim_idle`]-style operations; a lost race
//! surfaces as `Ok(None)`, never as an error.

mod activity;
mod containers;
mod pools;
mod sync_status;

pub use activity::ActivityFilter;
pub use containers::StatusCounts;
pub use pools::PoolRecord;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS containers (
    container_id       TEXT PRIMARY KEY,
    pool_id            TEXT NOT NULL,
    workload_id        TEXT NOT NULL,
    status             TEXT NOT NULL,
    tenant_id          TEXT,
    last_tenant_id     TEXT,
    last_activity_ms   INTEGER NOT NULL,
    claimed_at_ms      INTEGER,
    idle_expires_at_ms INTEGER,
    created_at_ms      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_containers_pool_status
    ON containers(pool_id, status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_containers_one_claim_per_tenant
    ON containers(pool_id, tenant_id) WHERE status = 'claimed';

CREATE TABLE IF NOT EXISTS sync_status (
    tenant_id       TEXT NOT NULL,
    sync_id         TEXT NOT NULL,
    state           TEXT NOT NULL,
    pending_count   INTEGER NOT NULL DEFAULT 0,
    errors          TEXT NOT NULL DEFAULT '[]',
    last_sync_at_ms INTEGER,
    PRIMARY KEY (tenant_id, sync_id)
);

CREATE TABLE IF NOT EXISTS activity (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    kind         TEXT NOT NULL,
    pool_id      TEXT,
    container_id TEXT,
    tenant_id    TEXT,
    message      TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    metadata     TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity(timestamp_ms);

CREATE TABLE IF NOT EXISTS pools (
    pool_id              TEXT PRIMARY KEY,
    workload_id          TEXT NOT NULL,
    min_idle             INTEGER NOT NULL,
    max_size             INTEGER NOT NULL,
    idle_timeout_ms      INTEGER NOT NULL,
    eviction_interval_ms INTEGER NOT NULL,
    acquire_timeout_ms   INTEGER NOT NULL,
    file_idle_ttl_ms     INTEGER,
    networks             TEXT,
    created_at_ms        INTEGER NOT NULL
);
"#;

/// Handle to the embedded store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    db: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the store at `path` and apply the
    /// schema. WAL mode is enabled so readers never block the writer.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&db).await?;
        debug!(path = %path.display(), "store opened");
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Close the underlying pool; the daemon calls this last during
    /// shutdown so in-flight writes land in the WAL first.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
