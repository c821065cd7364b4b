// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const CRATE_NAME: &str = "cfcache-core";

pub const ENV_CFCACHE_LOG_LEVEL: &str = "CFCACHE_LOG_LEVEL";
pub const ENV_CFCACHE_DIR: &str = "CFCACHE_DIR";
pub const ENV_CFCACHE_PLANE_PREFIX: &str = "CFCACHE_PLANE_PREFIX";
pub const ENV_CFCACHE_AGGREGATE_NAME: &str = "CFCACHE_AGGREGATE_NAME";
pub const ENV_CFCACHE_TOLERANCE_DEG: &str = "CFCACHE_TOLERANCE_DEG";
pub const ENV_CFCACHE_VERIFY_ON_OPEN: &str = "CFCACHE_VERIFY_ON_OPEN";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Resolves the base directory for on-disk caches.
///
/// Order: `CFCACHE_DIR`, then `$XDG_CACHE_HOME/cfcache`, then
/// `$HOME/.cache/cfcache`, then a relative `.cfcache/cache`.
#[must_use]
pub fn resolve_cache_dir() -> PathBuf {
    if let Ok(explicit) = std::env::var(ENV_CFCACHE_DIR) {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME") {
        let trimmed = xdg_cache_home.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join("cfcache");
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join(".cache").join("cfcache");
        }
    }

    PathBuf::from(".cfcache").join("cache")
}

#[must_use]
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl MachineError {
    #[must_use]
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MachineError {}
