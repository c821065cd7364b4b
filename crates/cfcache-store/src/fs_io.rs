// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::paths::{aux_lock_path, WRITE_PROBE_FILE};
use crate::{StoreError, StoreErrorCode};

/// Creates the storage root if needed and proves it is a writable directory.
pub fn ensure_storage_root(root: &Path) -> Result<(), StoreError> {
    if root.exists() && !root.is_dir() {
        return Err(StoreError::at(
            StoreErrorCode::StorageUnavailable,
            root,
            "storage root exists but is not a directory",
        ));
    }
    fs::create_dir_all(root).map_err(|e| {
        StoreError::at(
            StoreErrorCode::StorageUnavailable,
            root,
            format!("cannot create storage root: {e}"),
        )
    })?;
    let probe = root.join(format!("{WRITE_PROBE_FILE}.{}", std::process::id()));
    let written = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&probe)
        .and_then(|mut f| f.write_all(b"probe"));
    let _ = fs::remove_file(&probe);
    written.map_err(|e| {
        StoreError::at(
            StoreErrorCode::StorageUnavailable,
            root,
            format!("storage root is not writable: {e}"),
        )
    })
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut f = File::create(path).map_err(|e| StoreError::io(path, &e))?;
    f.write_all(bytes).map_err(|e| StoreError::io(path, &e))?;
    f.sync_all().map_err(|e| StoreError::io(path, &e))?;
    Ok(())
}

pub(crate) fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| StoreError::io(dir, &e))?;
    f.sync_all().map_err(|e| StoreError::io(dir, &e))?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "unnamed".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp.{}", std::process::id()))
}

/// Writes `bytes` to a hidden sibling, syncs it, then renames it over
/// `path`. Readers never observe a partially written file.
pub fn write_atomic_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::at(StoreErrorCode::Internal, path, "target has no parent directory")
    })?;
    let tmp = temp_sibling(path);
    if let Err(e) = write_and_sync(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(path, &e));
    }
    sync_dir(parent)?;
    debug!(path = %path.display(), bytes = bytes.len(), "atomic write committed");
    Ok(())
}

/// Exclusive writer lock over the aux index of one storage root. Dropping
/// the guard releases the lock.
#[derive(Debug)]
pub struct WriterLockGuard {
    lock_path: PathBuf,
}

impl WriterLockGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WriterLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!(path = %self.lock_path.display(), error = %e, "failed to release writer lock");
        }
    }
}

pub fn acquire_writer_lock(root: &Path) -> Result<WriterLockGuard, StoreError> {
    let lock_path = aux_lock_path(root);
    match OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&lock_path)
    {
        Ok(mut f) => {
            let _ = writeln!(f, "{}", std::process::id());
            Ok(WriterLockGuard { lock_path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::at(
            StoreErrorCode::Conflict,
            &lock_path,
            "another writer holds the aux index lock",
        )),
        Err(e) => Err(StoreError::at(
            StoreErrorCode::Io,
            &lock_path,
            format!("failed to acquire writer lock: {e}"),
        )),
    }
}
