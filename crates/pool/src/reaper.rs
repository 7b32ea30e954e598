// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle reaper: mtime-based inactivity detection for claimed
//! containers.
//!
//! One shared poll loop walks every watched state tree, bounded by
//! [`MAX_WALK_ENTRIES`]. A fresh write resets the TTL (and debounces
//! one DB update per tick); silence past the TTL fires the injected
//! expiry callback exactly once and drops the watch. The watch map's
//! mutex is never held across a filesystem walk.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_core::clock::{Clock, SystemClock};
use hearth_core::id::{ContainerId, PoolId, TenantId};
use hearth_store::Store;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Bound on entries visited per state-tree walk.
pub const MAX_WALK_ENTRIES: usize = 10_000;

/// Injected expiry action (runs the release pipeline).
pub type OnExpiry = Arc<
    dyn Fn(ContainerId, TenantId, PoolId) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

#[derive(Clone)]
struct Watch {
    tenant: TenantId,
    pool: PoolId,
    state_dir: PathBuf,
    ttl_ms: u64,
    last_modified_ms: u64,
}

/// The shared reaper. Clones share the watch map and the poll loop.
#[derive(Clone)]
pub struct IdleReaper {
    store: Store,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    watches: Arc<Mutex<HashMap<ContainerId, Watch>>>,
    on_expiry: Arc<RwLock<Option<OnExpiry>>>,
    cancel: CancellationToken,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl IdleReaper {
    pub fn new(store: Store, poll_interval: Duration) -> Self {
        Self::with_clock(store, poll_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            poll_interval,
            watches: Arc::new(Mutex::new(HashMap::new())),
            on_expiry: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
            poll_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Install the expiry action. Bound once at composition time.
    pub fn bind_expiry(&self, on_expiry: OnExpiry) {
        *self.on_expiry.write() = Some(on_expiry);
    }

    /// Watch a claimed container's state tree. Re-watching replaces the
    /// existing entry.
    pub async fn watch(
        &self,
        container: &ContainerId,
        tenant: &TenantId,
        pool: &PoolId,
        state_dir: &Path,
        ttl_ms: u64,
    ) {
        self.watch_seeded(container, tenant, pool, state_dir, ttl_ms, self.clock.epoch_ms())
            .await;
    }

    /// Watch with an explicit `last_modified` seed (restore path).
    pub async fn watch_seeded(
        &self,
        container: &ContainerId,
        tenant: &TenantId,
        pool: &PoolId,
        state_dir: &Path,
        ttl_ms: u64,
        last_modified_ms: u64,
    ) {
        self.watches.lock().insert(
            *container,
            Watch {
                tenant: tenant.clone(),
                pool: *pool,
                state_dir: state_dir.to_path_buf(),
                ttl_ms,
                last_modified_ms,
            },
        );
        // The deadline tracks the observed activity, which on restore
        // predates "now".
        if let Err(e) = self.store.set_idle_expiry(container, Some(last_modified_ms + ttl_ms)).await {
            warn!(container_id = %container, error = %e, "idle expiry write failed");
        }
        self.ensure_poll_loop();
        debug!(container_id = %container, ttl_ms, "watch started");
    }

    /// Drop the watch and clear the row's expiry deadline.
    pub async fn unwatch(&self, container: &ContainerId) {
        let removed = self.watches.lock().remove(container).is_some();
        if removed {
            if let Err(e) = self.store.set_idle_expiry(container, None).await {
                // Row may already be deleted; only log.
                debug!(container_id = %container, error = %e, "idle expiry clear failed");
            }
            debug!(container_id = %container, "watch removed");
        }
    }

    pub fn is_watching(&self, container: &ContainerId) -> bool {
        self.watches.lock().contains_key(container)
    }

    pub fn watched(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self.watches.lock().keys().copied().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Restore a watch after restart: expire immediately when the tree
    /// has been silent past the TTL, otherwise seed from the observed
    /// mtime so the TTL is honored against pre-restart activity.
    pub async fn restore(
        &self,
        container: &ContainerId,
        tenant: &TenantId,
        pool: &PoolId,
        state_dir: &Path,
        ttl_ms: u64,
    ) {
        let now = self.clock.epoch_ms();
        match walk_max_mtime(state_dir, MAX_WALK_ENTRIES) {
            Some(max_mtime) if now.saturating_sub(max_mtime) >= ttl_ms => {
                info!(container_id = %container, "expired while down; firing expiry");
                self.fire_expiry(*container, tenant.clone(), *pool).await;
            }
            Some(max_mtime) => {
                self.watch_seeded(container, tenant, pool, state_dir, ttl_ms, max_mtime).await;
            }
            // Missing state dir: fresh watch from now.
            None => {
                self.watch_seeded(container, tenant, pool, state_dir, ttl_ms, now).await;
            }
        }
    }

    /// Stop the poll loop and drop all watches.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.poll_task.lock().take() {
            task.abort();
        }
        self.watches.lock().clear();
    }

    fn ensure_poll_loop(&self) {
        let mut task = self.poll_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let reaper = self.clone();
        *task = Some(tokio::spawn(async move {
            // Self-scheduling: the next tick starts poll_interval after
            // the previous one finishes, so ticks never overlap.
            loop {
                tokio::select! {
                    _ = reaper.cancel.cancelled() => break,
                    _ = tokio::time::sleep(reaper.poll_interval) => {}
                }
                reaper.tick().await;
            }
        }));
    }

    async fn tick(&self) {
        let snapshot: Vec<(ContainerId, Watch)> = {
            let watches = self.watches.lock();
            watches.iter().map(|(id, w)| (*id, w.clone())).collect()
        };
        if snapshot.is_empty() {
            return;
        }

        // Walk every watched tree concurrently; each task is isolated
        // so one failure cannot starve the rest.
        let mut tasks = Vec::with_capacity(snapshot.len());
        for (id, watch) in snapshot {
            let reaper = self.clone();
            tasks.push(tokio::spawn(async move {
                reaper.check_one(id, watch).await;
            }));
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "reaper check task failed");
            }
        }
    }

    async fn check_one(&self, id: ContainerId, watch: Watch) {
        let state_dir = watch.state_dir.clone();
        let walked = tokio::task::spawn_blocking(move || {
            walk_max_mtime(&state_dir, MAX_WALK_ENTRIES)
        })
        .await
        .unwrap_or(None);

        let now = self.clock.epoch_ms();
        let (expired, refreshed) = {
            let mut watches = self.watches.lock();
            // Unwatched while we walked; nothing to do.
            let Some(entry) = watches.get_mut(&id) else {
                return;
            };
            match walked {
                Some(max_mtime) if max_mtime > entry.last_modified_ms => {
                    entry.last_modified_ms = max_mtime;
                    (false, true)
                }
                _ if now.saturating_sub(entry.last_modified_ms) >= entry.ttl_ms => {
                    watches.remove(&id);
                    (true, false)
                }
                _ => (false, false),
            }
        };

        if refreshed {
            // One debounced DB update per tick per container.
            if let Err(e) = self.store.touch_watch(&id, now, now + watch.ttl_ms).await {
                warn!(container_id = %id, error = %e, "activity refresh failed");
            }
        } else if expired {
            info!(container_id = %id, tenant = %watch.tenant, "file-idle TTL expired");
            self.fire_expiry(id, watch.tenant, watch.pool).await;
        }
    }

    async fn fire_expiry(&self, id: ContainerId, tenant: TenantId, pool: PoolId) {
        let callback = self.on_expiry.read().clone();
        match callback {
            Some(on_expiry) => on_expiry(id, tenant, pool).await,
            None => warn!(container_id = %id, "expiry fired with no handler bound"),
        }
    }
}

/// Best-effort max mtime (epoch ms) across a tree, visiting at most
/// `max_entries` entries. `None` when the root is missing.
fn walk_max_mtime(root: &Path, max_entries: usize) -> Option<u64> {
    fn mtime_ms(path: &Path) -> Option<u64> {
        let metadata = std::fs::symlink_metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
        Some(since_epoch.as_millis() as u64)
    }

    if !root.exists() {
        return None;
    }

    let mut max = mtime_ms(root)?;
    let mut visited = 1usize;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        // Subtrees may vanish mid-walk; skip quietly.
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            if visited >= max_entries {
                return Some(max);
            }
            visited += 1;
            let path = entry.path();
            if let Some(ms) = mtime_ms(&path) {
                max = max.max(ms);
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                stack.push(path);
            }
        }
    }
    Some(max)
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
