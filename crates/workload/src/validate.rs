// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Field-level workload validation.
//!
//! Issues carry dotted field paths (`sync.mappings[1].sink_path`) so the
//! HTTP layer can surface them verbatim.

use crate::types::{MappingDirection, WorkloadSpec};

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All failed checks for one spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub workload_id: String,
    pub issues: Vec<ValidationIssue>,
}

impl std::error::Error for ValidationError {}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "workload {:?} invalid:", self.workload_id)?;
        for issue in &self.issues {
            write!(f, " [{}]", issue)?;
        }
        Ok(())
    }
}

/// Validate a spec, collecting every issue rather than stopping at the
/// first.
pub fn validate(spec: &WorkloadSpec) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    let mut fail = |path: &str, message: String| {
        issues.push(ValidationIssue { path: path.to_string(), message });
    };

    if spec.id.is_empty() {
        fail("id", "must not be empty".into());
    } else if !spec
        .id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        fail("id", format!("invalid characters in {:?}", spec.id));
    }

    if spec.image.is_empty() {
        fail("image", "must not be empty".into());
    }

    if let Some(cmd) = &spec.command {
        if cmd.is_empty() {
            fail("command", "argv must not be empty when present".into());
        }
    }

    if spec.health_check.test.is_empty() {
        fail("health_check.test", "argv must not be empty".into());
    }
    if spec.health_check.interval_ms == 0 {
        fail("health_check.interval_ms", "must be positive".into());
    }
    if spec.health_check.timeout_ms == 0 {
        fail("health_check.timeout_ms", "must be positive".into());
    }

    for (name, _) in &spec.volumes.custom {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            fail(
                &format!("volumes.custom.{}", name),
                "custom volume names must be plain path segments".into(),
            );
        }
    }

    if let Some(pool) = &spec.pool {
        if pool.max_size == 0 {
            fail("pool.max_size", "must be at least 1".into());
        }
        if pool.min_idle > pool.max_size {
            fail(
                "pool.min_idle",
                format!("{} exceeds max_size {}", pool.min_idle, pool.max_size),
            );
        }
        if pool.file_idle_ttl_ms == Some(0) {
            fail("pool.file_idle_ttl_ms", "must be positive when set".into());
        }
    }

    if let Some(sync) = &spec.sync {
        if sync.sink.kind.is_empty() {
            fail("sync.sink.type", "must not be empty".into());
        }
        if sync.sink.bucket.is_empty() {
            fail("sync.sink.bucket", "must not be empty".into());
        }
        if sync.mappings.is_empty() {
            fail("sync.mappings", "at least one mapping is required".into());
        }
        for (i, mapping) in sync.mappings.iter().enumerate() {
            let base = format!("sync.mappings[{}]", i);
            if mapping.container_path.starts_with('/') || mapping.container_path.contains("..") {
                fail(
                    &format!("{}.container_path", base),
                    "must be relative to the state volume".into(),
                );
            }
            if mapping.sink_path.contains("..") {
                fail(&format!("{}.sink_path", base), "must not traverse upward".into());
            }
            // Download-only mappings make no sense with a periodic
            // bidirectional policy.
            if mapping.direction == MappingDirection::Download
                && sync.policy.interval_ms.is_some()
            {
                fail(
                    &format!("{}.direction", base),
                    "download-only mapping cannot be combined with policy.interval_ms".into(),
                );
            }
        }
        if sync.policy.interval_ms == Some(0) {
            fail("sync.policy.interval_ms", "must be positive when set".into());
        }
    }

    if let Some(hooks) = &spec.hooks {
        for (point, list) in [("post_claim", &hooks.post_claim), ("pre_release", &hooks.pre_release)]
        {
            for (i, hook) in list.iter().enumerate() {
                let base = format!("hooks.{}[{}]", point, i);
                if hook.command.is_empty() {
                    fail(&format!("{}.command", base), "argv must not be empty".into());
                }
                if hook.timeout_ms == 0 {
                    fail(&format!("{}.timeout_ms", base), "must be positive".into());
                }
                if hook.retries == 0 {
                    fail(&format!("{}.retries", base), "must be at least 1".into());
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { workload_id: spec.id.clone(), issues })
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
