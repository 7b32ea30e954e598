// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory view of validated workload specs with change events.
//!
//! Pools capture an `Arc<WorkloadSpec>` at creation and never observe
//! later replacements; reconfiguring a pool means destroying and
//! recreating it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

use crate::types::WorkloadSpec;
use crate::validate::{validate, ValidationError};

/// Change notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadChange {
    Upserted(String),
    Removed(String),
}

/// Registry of validated workload specs.
pub struct WorkloadRegistry {
    specs: RwLock<HashMap<String, Arc<WorkloadSpec>>>,
    changes: broadcast::Sender<WorkloadChange>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { specs: RwLock::new(HashMap::new()), changes }
    }

    /// Validate and insert (or replace) a spec.
    pub fn upsert(&self, spec: WorkloadSpec) -> Result<(), ValidationError> {
        validate(&spec)?;
        let id = spec.id.clone();
        self.specs.write().insert(id.clone(), Arc::new(spec));
        info!(workload_id = %id, "workload registered");
        let _ = self.changes.send(WorkloadChange::Upserted(id));
        Ok(())
    }

    /// Remove a spec. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let existed = self.specs.write().remove(id).is_some();
        if existed {
            info!(workload_id = %id, "workload removed");
            let _ = self.changes.send(WorkloadChange::Removed(id.to_string()));
        }
        existed
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkloadSpec>> {
        self.specs.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.specs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }

    /// Subscribe to change events. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkloadChange> {
        self.changes.subscribe()
    }
}

impl Default for WorkloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
