// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sync coordinator.
//!
//! Owns the at-most-one-concurrent-sync contract per
//! `(tenant, mapping.sink_path)`: a start observes-and-inserts into the
//! active set under one lock, and attempts that find the key present are
//! coalesced (skipped), never queued. Store `SyncStatus` transitions
//! bracket every run so pending intent stays visible.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use hearth_core::clock::{Clock, SystemClock};
use hearth_core::id::TenantId;
use hearth_core::sync::{SyncDirection, SyncErrorEntry, SyncOutcome};
use hearth_store::Store;
use hearth_workload::{MappingDirection, SyncConfig, SyncMapping};

use crate::rclone::{RcloneExecutor, RcloneMode, RclonePlan};
use crate::sink::SinkRegistry;
use crate::SyncError;

/// (tenant, sink_path): the unit of mutual exclusion.
type ActiveKey = (String, String);
/// (sync id, tenant): the unit of periodic scheduling.
type TickerKey = (String, String);

/// How one mapping fared in a coordinator call.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingRun {
    Ran { mode: RcloneMode, outcome: SyncOutcome },
    /// Another sync for the same key was in flight; attempt coalesced.
    Skipped,
    /// The mapping's direction does not participate in this phase.
    NotApplicable,
}

/// Per-mapping report returned to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingReport {
    pub container_path: String,
    pub sink_path: String,
    pub run: MappingRun,
}

impl MappingReport {
    pub fn succeeded(&self) -> bool {
        match &self.run {
            MappingRun::Ran { outcome, .. } => outcome.success,
            MappingRun::Skipped | MappingRun::NotApplicable => true,
        }
    }

    /// True when this report is a failed remote→local transfer; the
    /// claim pipeline aborts on these during the initial download.
    pub fn failed_download(&self) -> bool {
        matches!(&self.run, MappingRun::Ran { mode: RcloneMode::Copy, outcome } if !outcome.success)
    }
}

enum Phase {
    Claim { initial: bool },
    Release,
    Manual(SyncDirection),
}

/// Coordinates rclone runs for every tenant/mapping pair. Clones share
/// the active set and the ticker table.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Store,
    sinks: SinkRegistry,
    executor: RcloneExecutor,
    clock: Arc<dyn Clock>,
    active: Arc<Mutex<HashSet<ActiveKey>>>,
    tickers: Arc<Mutex<HashMap<TickerKey, JoinHandle<()>>>>,
}

impl SyncCoordinator {
    pub fn new(store: Store, sinks: SinkRegistry, executor: RcloneExecutor) -> Self {
        Self::with_clock(store, sinks, executor, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Store,
        sinks: SinkRegistry,
        executor: RcloneExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sinks,
            executor,
            clock,
            active: Arc::new(Mutex::new(HashSet::new())),
            tickers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Claim-time sync: downloads and bidirectional establishes. When
    /// `initial` (non-affinity claim) bisync runs with `--resync`.
    pub async fn on_claim(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        sync: &SyncConfig,
        state_dir: &Path,
        initial: bool,
    ) -> Result<Vec<MappingReport>, SyncError> {
        self.run_phase(tenant, sync_id, sync, state_dir, Phase::Claim { initial }).await
    }

    /// Release-time sync: uploads and bidirectional flushes.
    pub async fn on_release(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        sync: &SyncConfig,
        state_dir: &Path,
    ) -> Result<Vec<MappingReport>, SyncError> {
        self.run_phase(tenant, sync_id, sync, state_dir, Phase::Release).await
    }

    /// Manual invocation in a chosen direction.
    pub async fn trigger(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        sync: &SyncConfig,
        state_dir: &Path,
        direction: SyncDirection,
    ) -> Result<Vec<MappingReport>, SyncError> {
        self.run_phase(tenant, sync_id, sync, state_dir, Phase::Manual(direction)).await
    }

    /// Start the per-(sync id, tenant) periodic ticker when the policy
    /// declares an interval. Replaces any previous ticker for the key.
    pub fn start_periodic(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        sync: &SyncConfig,
        state_dir: &Path,
    ) {
        let Some(interval_ms) = sync.policy.interval_ms else {
            return;
        };
        let key: TickerKey = (sync_id.to_string(), tenant.to_string());
        let coordinator = self.clone();
        let tenant = tenant.clone();
        let sync_id = sync_id.to_string();
        let sync = sync.clone();
        let state_dir: PathBuf = state_dir.to_path_buf();

        let handle = tokio::spawn(async move {
            let interval = Duration::from_millis(interval_ms);
            loop {
                tokio::time::sleep(interval).await;
                let result = coordinator
                    .run_phase(
                        &tenant,
                        &sync_id,
                        &sync,
                        &state_dir,
                        Phase::Manual(SyncDirection::Both),
                    )
                    .await;
                if let Err(e) = result {
                    warn!(tenant = %tenant, sync_id = %sync_id, error = %e, "periodic sync failed");
                }
            }
        });

        if let Some(previous) = self.tickers.lock().insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel the periodic ticker for a (sync id, tenant), if any.
    pub fn stop_periodic(&self, sync_id: &str, tenant: &TenantId) {
        if let Some(handle) = self
            .tickers
            .lock()
            .remove(&(sync_id.to_string(), tenant.to_string()))
        {
            handle.abort();
        }
    }

    /// Number of syncs currently in flight.
    pub fn in_flight(&self) -> usize {
        self.active.lock().len()
    }

    /// Cancel tickers and await in-flight syncs up to `deadline`.
    pub async fn shutdown(&self, deadline: Duration) {
        let handles: Vec<_> = {
            let mut tickers = self.tickers.lock();
            tickers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.abort();
        }

        let give_up = tokio::time::Instant::now() + deadline;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= give_up {
                warn!(in_flight = self.in_flight(), "shutdown deadline hit with syncs in flight");
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn run_phase(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        sync: &SyncConfig,
        state_dir: &Path,
        phase: Phase,
    ) -> Result<Vec<MappingReport>, SyncError> {
        // Resolve the adapter before any status transition so an
        // unknown sink cannot strand pending_count.
        let adapter = self.sinks.get(&sync.sink.kind)?;

        let mut reports = Vec::with_capacity(sync.mappings.len());
        for mapping in &sync.mappings {
            let Some((mode, resync)) = plan_mode(mapping.direction, &phase) else {
                reports.push(MappingReport {
                    container_path: mapping.container_path.clone(),
                    sink_path: mapping.sink_path.clone(),
                    run: MappingRun::NotApplicable,
                });
                continue;
            };

            let local = state_dir.join(&mapping.container_path).display().to_string();
            let remote = adapter.remote_path(&sync.sink, tenant, &mapping.sink_path);
            let (source, dest) = match mode {
                RcloneMode::Copy => (remote, local),
                RcloneMode::Sync | RcloneMode::Bisync => (local, remote),
            };

            let mut sink_args = adapter.rclone_args(&sync.sink);
            sink_args.extend(sync.sink.extra_args.iter().cloned());
            let plan = RclonePlan {
                mode,
                source,
                dest,
                sink_args,
                pattern: sync.policy.pattern.clone(),
                resync,
            };

            let run = self.run_mapping(tenant, sync_id, state_dir, mapping, plan).await?;
            reports.push(MappingReport {
                container_path: mapping.container_path.clone(),
                sink_path: mapping.sink_path.clone(),
                run,
            });
        }
        Ok(reports)
    }

    async fn run_mapping(
        &self,
        tenant: &TenantId,
        sync_id: &str,
        state_dir: &Path,
        mapping: &SyncMapping,
        plan: RclonePlan,
    ) -> Result<MappingRun, SyncError> {
        let key: ActiveKey = (tenant.to_string(), mapping.sink_path.clone());
        {
            let mut active = self.active.lock();
            if !active.insert(key.clone()) {
                debug!(tenant = %tenant, sink_path = %mapping.sink_path, "sync already in flight, skipping");
                return Ok(MappingRun::Skipped);
            }
        }
        let _guard = ActiveGuard { set: Arc::clone(&self.active), key };

        self.store.sync_started(tenant, sync_id).await?;

        // Transfers into a wiped tree need the local directory present.
        let local_dir = state_dir.join(&mapping.container_path);
        if let Err(e) = tokio::fs::create_dir_all(&local_dir).await {
            warn!(path = %local_dir.display(), error = %e, "local sync dir create failed");
        }

        let outcome = match self.executor.run(&plan).await {
            Ok(outcome) => outcome,
            Err(spawn_err) => {
                // Spawn failure still completes the status transition.
                let now = self.clock.epoch_ms();
                let entry = SyncErrorEntry {
                    message: spawn_err.to_string(),
                    mapping_path: Some(mapping.container_path.clone()),
                    timestamp_ms: now,
                };
                self.store.sync_completed(tenant, sync_id, now, Some(entry)).await?;
                return Err(spawn_err);
            }
        };

        let now = self.clock.epoch_ms();
        let error = (!outcome.success).then(|| SyncErrorEntry {
            message: outcome.errors.join("; "),
            mapping_path: Some(mapping.container_path.clone()),
            timestamp_ms: now,
        });
        self.store.sync_completed(tenant, sync_id, now, error).await?;

        Ok(MappingRun::Ran { mode: plan.mode, outcome })
    }
}

/// Which mode (if any) a mapping runs in for a phase, plus the bisync
/// resync flag.
fn plan_mode(direction: MappingDirection, phase: &Phase) -> Option<(RcloneMode, bool)> {
    match (direction, phase) {
        (MappingDirection::Download, Phase::Claim { .. }) => Some((RcloneMode::Copy, false)),
        (MappingDirection::Bisync, Phase::Claim { initial }) => {
            Some((RcloneMode::Bisync, *initial))
        }
        (MappingDirection::Upload, Phase::Claim { .. }) => None,

        (MappingDirection::Upload, Phase::Release) => Some((RcloneMode::Sync, false)),
        (MappingDirection::Bisync, Phase::Release) => Some((RcloneMode::Bisync, false)),
        (MappingDirection::Download, Phase::Release) => None,

        (direction, Phase::Manual(manual)) => match (direction, manual) {
            (MappingDirection::Upload, SyncDirection::Upload | SyncDirection::Both) => {
                Some((RcloneMode::Sync, false))
            }
            (MappingDirection::Download, SyncDirection::Download | SyncDirection::Both) => {
                Some((RcloneMode::Copy, false))
            }
            (MappingDirection::Bisync, SyncDirection::Both) => Some((RcloneMode::Bisync, false)),
            (MappingDirection::Bisync, SyncDirection::Upload) => Some((RcloneMode::Sync, false)),
            (MappingDirection::Bisync, SyncDirection::Download) => {
                Some((RcloneMode::Copy, false))
            }
            _ => None,
        },
    }
}

struct ActiveGuard {
    set: Arc<Mutex<HashSet<ActiveKey>>>,
    key: ActiveKey,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
