// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory driver for tests.
//!
//! Containers live in a map; tests script health, create failures, and
//! exec results, then assert on the recorded call log.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::driver::{ContainerInfo, ExecResult, RuntimeDriver, RuntimeStatus};
use crate::error::RuntimeError;
use crate::spec::ContainerSpec;

#[derive(Debug, Clone)]
struct MockContainer {
    runtime_id: String,
    labels: HashMap<String, String>,
    running: bool,
    healthy: bool,
    started_at_ms: Option<u64>,
}

#[derive(Default)]
struct MockState {
    containers: HashMap<String, MockContainer>,
    fail_next_creates: u32,
    exec_results: VecDeque<ExecResult>,
    exec_log: Vec<(String, Vec<String>)>,
    destroyed: Vec<String>,
    restarted: Vec<String>,
}

/// Scriptable [`RuntimeDriver`] used across the workspace's tests.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
    next_id: Arc<AtomicU64>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` creates fail with an API error.
    pub fn fail_next_creates(&self, n: u32) {
        self.state.lock().fail_next_creates = n;
    }

    /// Override health for one container.
    pub fn set_healthy(&self, name: &str, healthy: bool) {
        if let Some(c) = self.state.lock().containers.get_mut(name) {
            c.healthy = healthy;
        }
    }

    /// Queue an exec result; execs default to exit 0 with empty output
    /// once the queue drains.
    pub fn push_exec_result(&self, result: ExecResult) {
        self.state.lock().exec_results.push_back(result);
    }

    /// Register a container that exists in the runtime but not via
    /// [`RuntimeDriver::create_container`] (recovery scenarios).
    pub fn seed_container(
        &self,
        name: &str,
        labels: HashMap<String, String>,
        running: bool,
    ) {
        let runtime_id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.lock().containers.insert(
            name.to_string(),
            MockContainer {
                runtime_id,
                labels,
                running,
                healthy: running,
                started_at_ms: running.then_some(0),
            },
        );
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().containers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn exec_log(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().exec_log.clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.state.lock().destroyed.clone()
    }

    pub fn restarted(&self) -> Vec<String> {
        self.state.lock().restarted.clone()
    }

    fn info(name: &str, c: &MockContainer) -> ContainerInfo {
        ContainerInfo {
            runtime_id: c.runtime_id.clone(),
            name: name.to_string(),
            status: if c.running { RuntimeStatus::Running } else { RuntimeStatus::Exited },
            labels: c.labels.clone(),
            started_at_ms: c.started_at_ms,
        }
    }
}

#[async_trait]
impl RuntimeDriver for MockDriver {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.state.lock();
        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(RuntimeError::Api("scripted create failure".into()));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::Api(format!("name in use: {}", spec.name)));
        }
        let runtime_id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        state.containers.insert(
            spec.name.clone(),
            MockContainer {
                runtime_id: runtime_id.clone(),
                labels: spec.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                running: true,
                healthy: true,
                started_at_ms: Some(0),
            },
        );
        Ok(runtime_id)
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        match self.state.lock().containers.get_mut(name) {
            Some(c) => {
                c.running = false;
                c.healthy = false;
                Ok(())
            }
            None => Err(RuntimeError::NotFound(name.to_string())),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        match state.containers.remove(name) {
            Some(_) => {
                state.destroyed.push(name.to_string());
                Ok(())
            }
            None => Err(RuntimeError::NotFound(name.to_string())),
        }
    }

    async fn destroy_container(&self, name: &str, _grace_seconds: u32) -> Result<(), RuntimeError> {
        self.remove_container(name).await
    }

    async fn restart_container(&self, name: &str, _grace_seconds: u32) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        match state.containers.get_mut(name) {
            Some(c) => {
                c.running = true;
                state.restarted.push(name.to_string());
                Ok(())
            }
            None => Err(RuntimeError::NotFound(name.to_string())),
        }
    }

    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        Ok(self.state.lock().containers.get(name).map(|c| Self::info(name, c)))
    }

    async fn is_healthy(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self
            .state
            .lock()
            .containers
            .get(name)
            .map(|c| c.running && c.healthy)
            .unwrap_or(false))
    }

    async fn list_containers(
        &self,
        label_filters: &HashMap<String, String>,
    ) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let state = self.state.lock();
        let mut infos: Vec<_> = state
            .containers
            .iter()
            .filter(|(_, c)| {
                label_filters
                    .iter()
                    .all(|(k, v)| c.labels.get(k).is_some_and(|have| have == v))
            })
            .map(|(name, c)| Self::info(name, c))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult, RuntimeError> {
        let mut state = self.state.lock();
        if !state.containers.contains_key(name) {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        state.exec_log.push((name.to_string(), argv.to_vec()));
        Ok(state.exec_results.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
