// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime driver capability set.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::spec::ContainerSpec;

/// Coarse runtime status as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Running,
    Exited,
    Other(String),
}

impl RuntimeStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RuntimeStatus::Running)
    }
}

/// Backend view of one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    /// Backend-assigned id (e.g. the Docker container id).
    pub runtime_id: String,
    pub name: String,
    pub status: RuntimeStatus,
    pub labels: HashMap<String, String>,
    pub started_at_ms: Option<u64>,
}

/// Captured output of an in-container exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Abstract container runtime.
///
/// Containers are addressed by their deterministic runtime name. Every
/// call may touch the network; callers own timeouts.
#[async_trait]
pub trait RuntimeDriver: Send + Sync {
    /// Create and start a container. Returns the backend runtime id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Stop (with grace) then force-remove.
    async fn destroy_container(&self, name: &str, grace_seconds: u32) -> Result<(), RuntimeError>;

    async fn restart_container(&self, name: &str, grace_seconds: u32) -> Result<(), RuntimeError>;

    /// `None` when the backend has no such container.
    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;

    /// Health as the backend sees it: a passing health check, or plain
    /// `running` when the container declares no check.
    async fn is_healthy(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Containers matching every given label, running or not.
    async fn list_containers(
        &self,
        label_filters: &HashMap<String, String>,
    ) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Blocking in-container exec; callers wrap it in a timeout.
    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult, RuntimeError>;
}
