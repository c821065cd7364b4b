// SPDX-License-Identifier: Apache-2.0

use cfcache_model::CacheEntryId;
use std::path::{Path, PathBuf};

use crate::{StoreError, StoreErrorCode};

pub const AUX_FILE: &str = "aux.dat";
pub const AUX_LOCK_FILE: &str = "aux.lock";
pub const DEFAULT_PLANE_PREFIX: &str = "CF";
pub const DEFAULT_AGGREGATE_NAME: &str = "avgPB";
pub(crate) const WRITE_PROBE_FILE: &str = ".cfcache-write-probe";

/// File name of one kernel plane: `<prefix><plane>_<id>`.
#[must_use]
pub fn plane_file_name(prefix: &str, plane: usize, id: CacheEntryId) -> String {
    format!("{prefix}{plane}_{id}")
}

#[must_use]
pub fn path_for(root: &Path, prefix: &str, plane: usize, id: CacheEntryId) -> PathBuf {
    root.join(plane_file_name(prefix, plane, id))
}

/// Inverse of [`plane_file_name`]; `None` for anything that is not a plane
/// file under `prefix`.
#[must_use]
pub fn parse_plane_file_name(prefix: &str, name: &str) -> Option<(usize, CacheEntryId)> {
    let rest = name.strip_prefix(prefix)?;
    let (plane, id) = rest.split_once('_')?;
    let plane = parse_digits(plane)?;
    let id = u32::try_from(parse_digits(id)?).ok()?;
    Some((plane, CacheEntryId::new(id)))
}

fn parse_digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[must_use]
pub fn aux_path(root: &Path) -> PathBuf {
    root.join(AUX_FILE)
}

#[must_use]
pub fn aux_lock_path(root: &Path) -> PathBuf {
    root.join(AUX_LOCK_FILE)
}

#[must_use]
pub fn aggregate_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// Plane prefixes and aggregate names become bare file names in the storage
/// root; reject anything that could escape it or collide with bookkeeping files.
pub fn validate_file_component(label: &str, value: &str) -> Result<(), StoreError> {
    let bad = value.is_empty()
        || value.starts_with('.')
        || value.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        || value == AUX_FILE
        || value == AUX_LOCK_FILE;
    if bad {
        return Err(StoreError::new(
            StoreErrorCode::Validation,
            format!("invalid {label}: {value:?}"),
        ));
    }
    Ok(())
}
