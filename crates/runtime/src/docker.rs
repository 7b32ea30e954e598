// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker driver over the daemon's local socket.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RestartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HealthConfig, HealthStatusEnum, HostConfig};
use bollard::network::ConnectNetworkOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::driver::{ContainerInfo, ExecResult, RuntimeDriver, RuntimeStatus};
use crate::error::RuntimeError;
use crate::spec::ContainerSpec;

/// [`RuntimeDriver`] backed by a local Docker daemon.
#[derive(Clone)]
pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    /// Connect using the environment's Docker defaults
    /// (`/var/run/docker.sock` or `DOCKER_HOST`).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    fn map_err(name: &str, err: bollard::errors::Error) -> RuntimeError {
        match err {
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                RuntimeError::NotFound(name.to_string())
            }
            other => RuntimeError::Api(other.to_string()),
        }
    }

    fn build_config(spec: &ContainerSpec) -> Config<String> {
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let binds: Vec<String> = spec
            .mounts
            .iter()
            .map(|m| {
                let mode = if m.read_only { "ro" } else { "rw" };
                format!("{}:{}:{}", m.host_path, m.container_path, mode)
            })
            .collect();

        let tmpfs: HashMap<String, String> = spec
            .tmpfs
            .iter()
            .map(|t| (t.container_path.clone(), format!("size={}", t.size_bytes)))
            .collect();

        let mut security_opt = Vec::new();
        if spec.security.no_new_privileges {
            security_opt.push("no-new-privileges:true".to_string());
        }

        let healthcheck = spec.health_check.as_ref().map(|check| {
            let mut test = Vec::with_capacity(check.argv.len() + 1);
            test.push(if check.shell { "CMD-SHELL" } else { "CMD" }.to_string());
            test.extend(check.argv.iter().cloned());
            HealthConfig {
                test: Some(test),
                interval: Some(check.interval_ms as i64 * 1_000_000),
                timeout: Some(check.timeout_ms as i64 * 1_000_000),
                retries: Some(check.retries as i64),
                start_period: check.start_period_ms.map(|ms| ms as i64 * 1_000_000),
                ..Default::default()
            }
        });

        let host_config = HostConfig {
            binds: Some(binds),
            tmpfs: Some(tmpfs),
            memory: spec.resources.memory_bytes.map(|b| b as i64),
            cpu_shares: spec.resources.cpu_shares.map(|s| s as i64),
            cap_drop: spec
                .security
                .drop_all_capabilities
                .then(|| vec!["ALL".to_string()]),
            security_opt: Some(security_opt),
            readonly_rootfs: Some(spec.security.read_only_root),
            dns: Some(spec.dns.clone()),
            network_mode: spec.networks.first().cloned(),
            ..Default::default()
        };

        Config {
            image: Some(spec.image.clone()),
            cmd: spec.command.clone(),
            env: Some(env),
            user: spec.user.clone(),
            hostname: Some(spec.name.clone()),
            labels: Some(spec.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            healthcheck,
            host_config: Some(host_config),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RuntimeDriver for DockerDriver {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions { name: spec.name.clone(), ..Default::default() };
        let config = Self::build_config(spec);

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Self::map_err(&spec.name, e))?;

        // The primary network rode in on network_mode; attach the rest
        // before start so the workload never observes a partial set.
        for network in spec.networks.iter().skip(1) {
            self.docker
                .connect_network(
                    network,
                    ConnectNetworkOptions {
                        container: spec.name.clone(),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| Self::map_err(&spec.name, e))?;
        }

        self.docker
            .start_container::<String>(&spec.name, None)
            .await
            .map_err(|e| Self::map_err(&spec.name, e))?;

        debug!(name = %spec.name, runtime_id = %created.id, "container created");
        Ok(created.id)
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(name, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|e| Self::map_err(name, e))
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions { force: true, ..Default::default() }),
            )
            .await
            .map_err(|e| Self::map_err(name, e))
    }

    async fn destroy_container(&self, name: &str, grace_seconds: u32) -> Result<(), RuntimeError> {
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: grace_seconds as i64 }))
            .await
        {
            Ok(()) => {}
            // Already stopped or already gone; removal decides.
            Err(e) => warn!(name, error = %e, "stop before destroy failed"),
        }
        self.remove_container(name).await
    }

    async fn restart_container(&self, name: &str, grace_seconds: u32) -> Result<(), RuntimeError> {
        self.docker
            .restart_container(name, Some(RestartContainerOptions { t: grace_seconds as isize }))
            .await
            .map_err(|e| Self::map_err(name, e))
    }

    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let inspect = match self.docker.inspect_container(name, None).await {
            Ok(inspect) => inspect,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => return Err(Self::map_err(name, e)),
        };

        let state = inspect.state.as_ref();
        let status = match state.and_then(|s| s.status) {
            Some(bollard::models::ContainerStateStatusEnum::RUNNING) => RuntimeStatus::Running,
            Some(bollard::models::ContainerStateStatusEnum::EXITED) => RuntimeStatus::Exited,
            Some(other) => RuntimeStatus::Other(other.to_string()),
            None => RuntimeStatus::Other("unknown".to_string()),
        };
        let started_at_ms = state
            .and_then(|s| s.started_at.as_deref())
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.timestamp_millis() as u64);

        Ok(Some(ContainerInfo {
            runtime_id: inspect.id.unwrap_or_default(),
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| name.to_string()),
            status,
            labels: inspect
                .config
                .and_then(|c| c.labels)
                .unwrap_or_default(),
            started_at_ms,
        }))
    }

    async fn is_healthy(&self, name: &str) -> Result<bool, RuntimeError> {
        let inspect = match self.docker.inspect_container(name, None).await {
            Ok(inspect) => inspect,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(false),
            Err(e) => return Err(Self::map_err(name, e)),
        };
        let Some(state) = inspect.state else {
            return Ok(false);
        };
        let running = matches!(
            state.status,
            Some(bollard::models::ContainerStateStatusEnum::RUNNING)
        );
        match state.health.and_then(|h| h.status) {
            Some(HealthStatusEnum::HEALTHY) => Ok(running),
            // No health check declared: running is as healthy as it gets.
            Some(HealthStatusEnum::NONE) | Some(HealthStatusEnum::EMPTY) | None => Ok(running),
            Some(_) => Ok(false),
        }
    }

    async fn list_containers(
        &self,
        label_filters: &HashMap<String, String>,
    ) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let labels: Vec<String> =
            label_filters.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), labels);

        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| Self::map_err("<list>", e))?;

        Ok(summaries
            .into_iter()
            .map(|summary| {
                let status = match summary.state.as_deref() {
                    Some("running") => RuntimeStatus::Running,
                    Some("exited") => RuntimeStatus::Exited,
                    Some(other) => RuntimeStatus::Other(other.to_string()),
                    None => RuntimeStatus::Other("unknown".to_string()),
                };
                ContainerInfo {
                    runtime_id: summary.id.unwrap_or_default(),
                    name: summary
                        .names
                        .and_then(|names| names.into_iter().next())
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_default(),
                    status,
                    labels: summary.labels.unwrap_or_default(),
                    started_at_ms: summary.created.map(|secs| secs as u64 * 1000),
                }
            })
            .collect())
    }

    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult, RuntimeError> {
        let created = self
            .docker
            .create_exec(
                name,
                CreateExecOptions::<String> {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Self::map_err(name, e))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        match self
            .docker
            .start_exec(&created.id, None)
            .await
            .map_err(|e| Self::map_err(name, e))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk.map_err(|e| Self::map_err(name, e))? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&created.id)
            .await
            .map_err(|e| Self::map_err(name, e))?;
        let exit_code = inspect.exit_code.unwrap_or(-1) as i32;

        Ok(ExecResult { exit_code, stdout, stderr })
    }
}
