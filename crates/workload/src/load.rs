// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML loading with environment interpolation.
//!
//! `${VAR}` substitutes the environment variable; `${VAR:-default}`
//! falls back to the literal default. Interpolation runs on the raw
//! text before parsing so it works in any YAML position.

use std::path::Path;

use regex::Regex;

use crate::types::WorkloadSpec;
use crate::validate::{validate, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: undefined environment variable ${{{name}}}")]
    UndefinedVar { path: String, name: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse and validate one workload spec from YAML text.
///
/// `origin` only labels errors (a file path or `"<inline>"`).
pub fn from_yaml_str(origin: &str, text: &str) -> Result<WorkloadSpec, LoadError> {
    let interpolated = interpolate_env(origin, text, &|name| std::env::var(name).ok())?;
    let spec: WorkloadSpec = serde_yaml::from_str(&interpolated)
        .map_err(|source| LoadError::Yaml { path: origin.to_string(), source })?;
    validate(&spec)?;
    Ok(spec)
}

/// Load every `*.yml`/`*.yaml` file in a directory, sorted by file name.
pub fn load_dir(dir: &Path) -> Result<Vec<WorkloadSpec>, LoadError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| LoadError::Io { path: dir.display().to_string(), source })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    paths.sort();

    let mut specs = Vec::with_capacity(paths.len());
    for path in paths {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(&path)
            .map_err(|source| LoadError::Io { path: label.clone(), source })?;
        specs.push(from_yaml_str(&label, &text)?);
    }
    Ok(specs)
}

/// Replace `${VAR}` / `${VAR:-default}` using `lookup`.
fn interpolate_env(
    origin: &str,
    text: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, LoadError> {
    // Compiled on every call; loading is a startup-time path.
    #[allow(clippy::unwrap_used)]
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        #[allow(clippy::unwrap_used)]
        let whole = caps.get(0).unwrap();
        #[allow(clippy::unwrap_used)]
        let name = caps.get(1).unwrap().as_str();
        // `${tenantId}` is a sink-prefix placeholder interpolated per
        // tenant at sync time, never from the environment.
        if name == "tenantId" {
            out.push_str(&text[last..whole.end()]);
            last = whole.end();
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => match caps.get(2) {
                Some(default) => out.push_str(default.as_str()),
                None => {
                    return Err(LoadError::UndefinedVar {
                        path: origin.to_string(),
                        name: name.to_string(),
                    })
                }
            },
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
