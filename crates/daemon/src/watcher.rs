// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload directory watcher.
//!
//! Polls the workloads directory and feeds the registry: new and
//! modified YAML files are re-validated and upserted, vanished files
//! remove their workload. Running pools keep the spec `Arc` they were
//! built with; a changed workload only affects pools created after the
//! change.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hearth_workload::{from_yaml_str, WorkloadRegistry};

/// Per-file scan state.
#[derive(Debug, Clone)]
pub(crate) struct FileState {
    modified_ms: u64,
    /// Workload id this file last registered, for removal on delete.
    workload_id: Option<String>,
}

/// Map of scanned files, threaded from the startup scan into the
/// background loop.
pub(crate) type ScanState = HashMap<PathBuf, FileState>;

/// Background poller over one workloads directory.
pub struct WorkloadWatcher {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WorkloadWatcher {
    /// Keep polling `dir` every `interval`, continuing from the state
    /// an initial [`scan_workloads`] call produced.
    pub(crate) fn spawn(
        dir: PathBuf,
        registry: Arc<WorkloadRegistry>,
        interval: Duration,
        mut seen: ScanState,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                scan_workloads(&dir, &registry, &mut seen);
            }
        });
        Self { cancel, task: Mutex::new(Some(task)) }
    }

    /// Stop the poll loop. First step of daemon shutdown so no new
    /// workloads land while pools wind down.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// One scan pass: load changed files into the registry, drop workloads
/// whose files are gone. Per-file failures are logged and skipped.
pub(crate) fn scan_workloads(dir: &Path, registry: &WorkloadRegistry, seen: &mut ScanState) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "workloads dir scan failed");
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    paths.sort();

    let mut present: HashSet<PathBuf> = HashSet::new();
    for path in paths {
        present.insert(path.clone());
        let modified_ms = file_mtime_ms(&path).unwrap_or(0);
        let previous = seen.get(&path).cloned();
        if previous.as_ref().is_some_and(|f| f.modified_ms == modified_ms) {
            continue;
        }

        let label = path.display().to_string();
        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| from_yaml_str(&label, &text).map_err(|e| e.to_string()));
        let workload_id = match loaded {
            Ok(spec) => {
                let id = spec.id.clone();
                // A file that switched its workload id drops the old one.
                if let Some(old) = previous.as_ref().and_then(|f| f.workload_id.as_deref()) {
                    if old != id {
                        registry.remove(old);
                    }
                }
                match registry.upsert(spec) {
                    Ok(()) => {
                        info!(file = %label, workload_id = %id, "workload loaded");
                        Some(id)
                    }
                    Err(e) => {
                        warn!(file = %label, error = %e, "workload rejected");
                        previous.and_then(|f| f.workload_id)
                    }
                }
            }
            Err(e) => {
                warn!(file = %label, error = %e, "workload file unreadable");
                previous.and_then(|f| f.workload_id)
            }
        };
        // Record the mtime even on failure so a broken file is not
        // re-parsed every tick.
        seen.insert(path, FileState { modified_ms, workload_id });
    }

    let gone: Vec<PathBuf> = seen.keys().filter(|p| !present.contains(*p)).cloned().collect();
    for path in gone {
        if let Some(state) = seen.remove(&path) {
            if let Some(id) = state.workload_id {
                if registry.remove(&id) {
                    info!(file = %path.display(), workload_id = %id, "workload file removed");
                }
            }
        }
    }
}

fn file_mtime_ms(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as u64)
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
