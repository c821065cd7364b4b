// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;

use cfcache_core::{
    env_bool, resolve_cache_dir, ENV_CFCACHE_AGGREGATE_NAME, ENV_CFCACHE_DIR,
    ENV_CFCACHE_PLANE_PREFIX, ENV_CFCACHE_TOLERANCE_DEG, ENV_CFCACHE_VERIFY_ON_OPEN,
};
use cfcache_store::paths::{
    validate_file_component, DEFAULT_AGGREGATE_NAME, DEFAULT_PLANE_PREFIX,
};
use serde::Serialize;

use crate::CacheError;

pub const DEFAULT_TOLERANCE_DEG: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub plane_prefix: String,
    pub aggregate_name: String,
    /// Match tolerance used by callers that do not pass one explicitly.
    pub default_tolerance_deg: f64,
    /// Cross-check the index against plane files at open and drop a stale tail.
    pub verify_on_open: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: resolve_cache_dir().join("cf"),
            plane_prefix: DEFAULT_PLANE_PREFIX.to_string(),
            aggregate_name: DEFAULT_AGGREGATE_NAME.to_string(),
            default_tolerance_deg: DEFAULT_TOLERANCE_DEG,
            verify_on_open: true,
        }
    }
}

fn env_string(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

impl CacheConfig {
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `CFCACHE_*` environment variables. Unparsable
    /// values fall back to the default; call [`CacheConfig::validate`] before use.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: env::var_os(ENV_CFCACHE_DIR)
                .filter(|v| !v.is_empty())
                .map_or(defaults.root, PathBuf::from),
            plane_prefix: env_string(ENV_CFCACHE_PLANE_PREFIX, defaults.plane_prefix),
            aggregate_name: env_string(ENV_CFCACHE_AGGREGATE_NAME, defaults.aggregate_name),
            default_tolerance_deg: env_f64(
                ENV_CFCACHE_TOLERANCE_DEG,
                defaults.default_tolerance_deg,
            ),
            verify_on_open: env_bool(ENV_CFCACHE_VERIFY_ON_OPEN, defaults.verify_on_open),
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.root.as_os_str().is_empty() {
            return Err(CacheError::invalid("cache root must not be empty"));
        }
        validate_file_component("plane prefix", &self.plane_prefix)?;
        validate_file_component("aggregate name", &self.aggregate_name)?;
        if !self.default_tolerance_deg.is_finite() || self.default_tolerance_deg < 0.0 {
            return Err(CacheError::invalid(format!(
                "default tolerance must be finite and non-negative, got {}",
                self.default_tolerance_deg
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn default_tolerance_rad(&self) -> f64 {
        self.default_tolerance_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::CacheConfig;
    use crate::CacheErrorCode;

    #[test]
    fn defaults_validate() {
        let cfg = CacheConfig::with_root("/tmp/cf");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.plane_prefix, "CF");
        assert_eq!(cfg.aggregate_name, "avgPB");
        assert!(cfg.verify_on_open);
    }

    #[test]
    fn validation_rejects_bad_names_and_tolerances() {
        let cfg = CacheConfig {
            plane_prefix: "w/CF".to_string(),
            ..CacheConfig::with_root("/tmp/cf")
        };
        let err = cfg.validate().expect_err("separator in prefix");
        assert_eq!(err.code(), CacheErrorCode::InvalidRequest);

        let cfg = CacheConfig {
            aggregate_name: String::new(),
            ..CacheConfig::with_root("/tmp/cf")
        };
        assert!(cfg.validate().is_err());

        for tol in [-0.5, f64::NAN, f64::INFINITY] {
            let cfg = CacheConfig {
                default_tolerance_deg: tol,
                ..CacheConfig::with_root("/tmp/cf")
            };
            assert!(cfg.validate().is_err(), "tolerance {tol} must be rejected");
        }
    }

    #[test]
    fn config_serializes_for_diagnostics() {
        let cfg = CacheConfig::with_root("/tmp/cf");
        let json = serde_json::to_value(&cfg).expect("json");
        assert_eq!(json["plane_prefix"], "CF");
        assert_eq!(json["default_tolerance_deg"], 1.0);
    }
}
