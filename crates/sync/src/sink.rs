// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sink adapters: remote-path construction and provider flags per sink
//! type. Adapters are registered by tag; the registry ships with `s3`.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::id::TenantId;
use hearth_workload::SinkConfig;

use crate::SyncError;

/// One remote object-store flavor.
pub trait SinkAdapter: Send + Sync {
    /// Remote path for a mapping: sink address + interpolated prefix +
    /// sink-relative path, slash-normalized.
    fn remote_path(&self, sink: &SinkConfig, tenant: &TenantId, sink_path: &str) -> String;

    /// Provider/credential flags for the sync subprocess. When the sink
    /// declares no access key the tool falls back to environment
    /// credentials.
    fn rclone_args(&self, sink: &SinkConfig) -> Vec<String>;
}

/// Interpolate `${tenantId}` and collapse duplicate slashes.
pub(crate) fn tenant_prefix(prefix: &str, tenant: &TenantId) -> String {
    let interpolated = prefix.replace("${tenantId}", tenant.as_str());
    normalize_slashes(&interpolated)
}

pub(crate) fn normalize_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_slash && !out.is_empty() {
                out.push('/');
            }
            last_slash = true;
        } else {
            out.push(c);
            last_slash = false;
        }
    }
    out.trim_end_matches('/').to_string()
}

/// S3-compatible object storage.
#[derive(Debug, Default)]
pub struct S3Adapter;

impl SinkAdapter for S3Adapter {
    fn remote_path(&self, sink: &SinkConfig, tenant: &TenantId, sink_path: &str) -> String {
        let prefix = tenant_prefix(&sink.prefix, tenant);
        let joined = if prefix.is_empty() {
            normalize_slashes(sink_path)
        } else {
            format!("{}/{}", prefix, normalize_slashes(sink_path))
        };
        format!(":s3:{}/{}", sink.bucket, joined)
    }

    fn rclone_args(&self, sink: &SinkConfig) -> Vec<String> {
        let mut args = Vec::new();
        let provider = sink.provider.as_deref().unwrap_or("AWS");
        args.push("--s3-provider".to_string());
        args.push(provider.to_string());
        if let Some(endpoint) = &sink.endpoint {
            args.push("--s3-endpoint".to_string());
            args.push(endpoint.clone());
        }
        if let Some(region) = &sink.region {
            args.push("--s3-region".to_string());
            args.push(region.clone());
        }
        match (&sink.access_key, &sink.secret_key) {
            (Some(access), Some(secret)) => {
                args.push("--s3-access-key-id".to_string());
                args.push(access.clone());
                args.push("--s3-secret-access-key".to_string());
                args.push(secret.clone());
            }
            _ => {
                args.push("--s3-env-auth".to_string());
                args.push("true".to_string());
            }
        }
        args
    }
}

/// Adapter registry keyed by `sink.type`.
#[derive(Clone)]
pub struct SinkRegistry {
    adapters: HashMap<String, Arc<dyn SinkAdapter>>,
}

impl SinkRegistry {
    /// Registry with the built-in `s3` adapter.
    pub fn with_builtins() -> Self {
        let mut registry = Self { adapters: HashMap::new() };
        registry.register("s3", Arc::new(S3Adapter));
        registry
    }

    /// Register (or replace) an adapter under a tag.
    pub fn register(&mut self, kind: impl Into<String>, adapter: Arc<dyn SinkAdapter>) {
        self.adapters.insert(kind.into(), adapter);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn SinkAdapter>, SyncError> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| SyncError::UnknownSink(kind.to_string()))
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
