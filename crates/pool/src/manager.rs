// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container manager: deterministic host layout plus create / seed /
//! wipe / restart / destroy / readiness over the runtime driver.
//!
//! The manager is stateless; every operation derives paths and names
//! from the container id alone.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, warn};

use hearth_core::clock::{Clock, SystemClock};
use hearth_core::container::runtime_name;
use hearth_core::id::{ContainerId, PoolId};
use hearth_runtime::labels;
use hearth_runtime::{
    ContainerSpec, HealthCheckSpec, MountSpec, ResourceLimits, RuntimeDriver, SecurityOpts,
    TmpfsSpec,
};
use hearth_workload::WorkloadSpec;

use crate::error::PoolError;
use crate::fsutil;

/// Host directory roots for container volumes.
#[derive(Debug, Clone)]
pub struct HostLayout {
    pub state_base: PathBuf,
    pub secrets_base: PathBuf,
    pub socket_base: PathBuf,
}

impl HostLayout {
    /// Conventional layout under one root: `state/`, `secrets/`,
    /// `sockets/`.
    pub fn under(root: &std::path::Path) -> Self {
        Self {
            state_base: root.join("state"),
            secrets_base: root.join("secrets"),
            socket_base: root.join("sockets"),
        }
    }

    pub fn state_dir(&self, id: &ContainerId) -> PathBuf {
        self.state_base.join(id.as_str())
    }

    pub fn secrets_dir(&self, id: &ContainerId) -> PathBuf {
        self.secrets_base.join(id.as_str())
    }

    pub fn socket_dir(&self, id: &ContainerId) -> PathBuf {
        self.socket_base.join(id.as_str())
    }
}

/// Node-wide defaults applied to every container spec.
#[derive(Debug, Clone)]
pub struct ManagerDefaults {
    pub tmpfs_size_bytes: u64,
    pub cpu_shares: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub dns: Vec<String>,
}

impl Default for ManagerDefaults {
    fn default() -> Self {
        Self {
            tmpfs_size_bytes: 64 * 1024 * 1024,
            cpu_shares: Some(512),
            memory_bytes: Some(512 * 1024 * 1024),
            dns: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
        }
    }
}

/// Stateless wrapper over the runtime driver and the host filesystem.
pub struct ContainerManager {
    driver: Arc<dyn RuntimeDriver>,
    layout: HostLayout,
    defaults: ManagerDefaults,
    clock: Arc<dyn Clock>,
}

impl ContainerManager {
    pub fn new(driver: Arc<dyn RuntimeDriver>, layout: HostLayout, defaults: ManagerDefaults) -> Self {
        Self::with_clock(driver, layout, defaults, Arc::new(SystemClock))
    }

    pub fn with_clock(
        driver: Arc<dyn RuntimeDriver>,
        layout: HostLayout,
        defaults: ManagerDefaults,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { driver, layout, defaults, clock }
    }

    pub fn driver(&self) -> &Arc<dyn RuntimeDriver> {
        &self.driver
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    pub fn state_dir(&self, id: &ContainerId) -> PathBuf {
        self.layout.state_dir(id)
    }

    /// Create host directories, apply seeds, and start the container.
    /// Returns the new container id.
    pub async fn create(
        &self,
        workload: &WorkloadSpec,
        pool_id: &PoolId,
        networks: Option<&[String]>,
    ) -> Result<ContainerId, PoolError> {
        let id = ContainerId::generate(self.clock.epoch_ms());
        self.prepare_dirs(workload, &id)?;
        self.apply_seeds(workload, &id)?;

        let spec = self.build_spec(workload, &id, pool_id, networks);
        match self.driver.create_container(&spec).await {
            Ok(runtime_id) => {
                debug!(container_id = %id, runtime_id = %runtime_id, "container created");
                Ok(id)
            }
            Err(e) => {
                // Half-created host dirs would leak; runtime create
                // failed so only the filesystem needs undoing.
                self.remove_host_dirs(&id);
                Err(e.into())
            }
        }
    }

    /// Create (or recreate) the host-side volume directories.
    fn prepare_dirs(&self, workload: &WorkloadSpec, id: &ContainerId) -> Result<(), PoolError> {
        let state = self.layout.state_dir(id);
        std::fs::create_dir_all(&state)?;
        for name in workload.volumes.custom.keys() {
            std::fs::create_dir_all(state.join("custom").join(name))?;
        }
        std::fs::create_dir_all(self.layout.secrets_dir(id))?;
        std::fs::create_dir_all(self.layout.socket_dir(id))?;

        if let Some(uid) = workload.numeric_uid() {
            fsutil::chown_tree(&state, uid);
            fsutil::chown_tree(&self.layout.secrets_dir(id), uid);
            fsutil::chown_tree(&self.layout.socket_dir(id), uid);
        }
        Ok(())
    }

    /// Copy every declared seed into its volume, overwriting.
    pub fn apply_seeds(&self, workload: &WorkloadSpec, id: &ContainerId) -> Result<(), PoolError> {
        let state = self.layout.state_dir(id);
        if let Some(seed) = &workload.volumes.state.seed {
            fsutil::copy_tree(seed, &state)?;
        }
        if let Some(seed) = &workload.volumes.secrets.seed {
            fsutil::copy_tree(seed, &self.layout.secrets_dir(id))?;
        }
        for (name, volume) in &workload.volumes.custom {
            if let Some(seed) = &volume.seed {
                fsutil::copy_tree(seed, &state.join("custom").join(name))?;
            }
        }
        if let Some(uid) = workload.numeric_uid() {
            fsutil::chown_tree(&state, uid);
            fsutil::chown_tree(&self.layout.secrets_dir(id), uid);
        }
        Ok(())
    }

    /// Wipe state and secrets for a tenant change: remove, recreate,
    /// chown, reseed.
    pub async fn wipe_for_new_tenant(
        &self,
        workload: &WorkloadSpec,
        id: &ContainerId,
    ) -> Result<(), PoolError> {
        fsutil::remove_dir_if_exists(&self.layout.state_dir(id))?;
        fsutil::remove_dir_if_exists(&self.layout.secrets_dir(id))?;
        self.prepare_dirs(workload, id)?;
        self.apply_seeds(workload, id)?;
        debug!(container_id = %id, "state wiped for new tenant");
        Ok(())
    }

    /// Restart with an overall deadline (2s in the claim path).
    pub async fn restart(&self, id: &ContainerId, deadline: Duration) -> Result<(), PoolError> {
        let name = runtime_name(id);
        let grace = deadline.as_secs().max(1) as u32;
        match tokio::time::timeout(deadline, self.driver.restart_container(&name, grace)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PoolError::Runtime(hearth_runtime::RuntimeError::Api(format!(
                "restart of {name} exceeded {}ms",
                deadline.as_millis()
            )))),
        }
    }

    /// Destroy the runtime container and remove its host directories.
    pub async fn destroy(&self, id: &ContainerId, grace_seconds: u32) -> Result<(), PoolError> {
        let name = runtime_name(id);
        let result = self.driver.destroy_container(&name, grace_seconds).await;
        self.remove_host_dirs(id);
        Ok(result?)
    }

    /// Remove the three host directories. Best effort; bisync caches and
    /// already-missing trees are tolerated.
    pub fn remove_host_dirs(&self, id: &ContainerId) {
        for dir in [
            self.layout.state_dir(id),
            self.layout.secrets_dir(id),
            self.layout.socket_dir(id),
        ] {
            if let Err(e) = fsutil::remove_dir_if_exists(&dir) {
                warn!(path = %dir.display(), error = %e, "host dir cleanup failed");
            }
        }
    }

    /// Health as a bool; driver errors count as unhealthy.
    pub async fn is_healthy(&self, id: &ContainerId) -> bool {
        match self.driver.is_healthy(&runtime_name(id)).await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(container_id = %id, error = %e, "health check errored");
                false
            }
        }
    }

    /// Poll health every `interval` until healthy or `deadline`.
    pub async fn wait_healthy(
        &self,
        id: &ContainerId,
        deadline: Duration,
        interval: Duration,
    ) -> Result<(), PoolError> {
        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            if self.is_healthy(id).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= give_up {
                return Err(PoolError::HealthTimeout {
                    container_id: *id,
                    waited_ms: deadline.as_millis() as u64,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Build the backend-neutral creation spec for one container.
    pub fn build_spec(
        &self,
        workload: &WorkloadSpec,
        id: &ContainerId,
        pool_id: &PoolId,
        networks: Option<&[String]>,
    ) -> ContainerSpec {
        let state_dir = self.layout.state_dir(id);

        let mut mounts = vec![
            MountSpec {
                host_path: state_dir.display().to_string(),
                container_path: "/state".to_string(),
                read_only: false,
            },
            MountSpec {
                host_path: self.layout.secrets_dir(id).display().to_string(),
                container_path: "/secrets".to_string(),
                read_only: true,
            },
            MountSpec {
                host_path: self.layout.socket_dir(id).display().to_string(),
                container_path: "/comm".to_string(),
                read_only: false,
            },
        ];
        for name in workload.volumes.custom.keys() {
            mounts.push(MountSpec {
                host_path: state_dir.join("custom").join(name).display().to_string(),
                container_path: format!("/state/custom/{name}"),
                read_only: false,
            });
        }

        let tmpfs = ["/tmp", "/var/tmp", "/run"]
            .into_iter()
            .map(|path| TmpfsSpec {
                container_path: path.to_string(),
                size_bytes: self.defaults.tmpfs_size_bytes,
            })
            .collect();

        let networks = match networks {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ if !workload.networks.is_empty() => workload.networks.clone(),
            _ => vec!["bridge".to_string()],
        };

        let dns = if workload.dns.is_empty() {
            self.defaults.dns.clone()
        } else {
            workload.dns.clone()
        };

        let mut spec_labels = IndexMap::new();
        spec_labels.insert(labels::MANAGED.to_string(), "true".to_string());
        spec_labels.insert(labels::CONTAINER_ID.to_string(), id.to_string());
        spec_labels.insert(labels::POOL_ID.to_string(), pool_id.to_string());
        spec_labels.insert(labels::WORKLOAD_ID.to_string(), workload.id.clone());
        spec_labels.insert(labels::CREATED_AT.to_string(), self.clock.epoch_ms().to_string());

        let check = &workload.health_check;
        let health_check = Some(HealthCheckSpec::from_test(
            &check.test,
            check.interval_ms,
            check.timeout_ms,
            check.retries,
            check.start_period_ms,
        ));

        ContainerSpec {
            name: runtime_name(id),
            image: workload.image.clone(),
            command: workload.command.clone(),
            env: workload.env.clone(),
            user: workload.user.clone(),
            mounts,
            tmpfs,
            resources: ResourceLimits {
                cpu_shares: self.defaults.cpu_shares,
                memory_bytes: self.defaults.memory_bytes,
            },
            security: SecurityOpts {
                read_only_root: workload.read_only_root,
                drop_all_capabilities: true,
                no_new_privileges: true,
                run_as_non_root: true,
            },
            networks,
            dns,
            labels: spec_labels,
            health_check,
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
