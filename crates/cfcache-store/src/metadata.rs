// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use cfcache_core::sha256_hex;
use cfcache_model::{AuxIndex, CacheEntryId, Support, SupportTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs_io::{acquire_writer_lock, ensure_storage_root, write_atomic_file, WriterLockGuard};
use crate::kernels::PersistentKernelStore;
use crate::paths::aux_path;
use crate::{StoreError, StoreErrorCode};

pub const AUX_FORMAT: &str = "cfcache-aux";
pub const AUX_FORMAT_VERSION: u32 = 1;

/// Largest tolerated disagreement between the stored degree and radian forms
/// of an angle, in degrees.
const ANGLE_FORM_TOLERANCE_DEG: f64 = 1e-6;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuxHeader {
    format: String,
    version: u32,
    entry_count: usize,
    plane_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuxLine {
    id: CacheEntryId,
    /// Human-readable form; `angle_rad` is authoritative.
    angle_deg: f64,
    angle_rad: f64,
    supports: Vec<Support>,
    sampling: f64,
}

fn render_line<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))
}

/// Renders the index as the `aux.dat` JSON-lines document.
pub fn encode_aux(index: &AuxIndex) -> Result<String, StoreError> {
    let header = AuxHeader {
        format: AUX_FORMAT.to_string(),
        version: AUX_FORMAT_VERSION,
        entry_count: index.entry_count(),
        plane_count: index.plane_count(),
    };
    let mut out = render_line(&header)?;
    out.push('\n');
    for entry in index.entries() {
        let line = AuxLine {
            id: entry.id,
            angle_deg: entry.angle_deg(),
            angle_rad: entry.angle_rad,
            supports: entry.supports,
            sampling: entry.sampling,
        };
        out.push_str(&render_line(&line)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parses an `aux.dat` document. Every structural problem is reported as
/// [`StoreErrorCode::CorruptMetadata`] naming the offending line.
pub fn decode_aux(text: &str, path: &Path) -> Result<AuxIndex, StoreError> {
    let corrupt = |msg: String| StoreError::at(StoreErrorCode::CorruptMetadata, path, msg);
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_no, header_text) = lines
        .next()
        .ok_or_else(|| corrupt("empty index file, header missing".to_string()))?;
    let header: AuxHeader = serde_json::from_str(header_text)
        .map_err(|e| corrupt(format!("line {header_no}: malformed header: {e}")))?;
    if header.format != AUX_FORMAT || header.version != AUX_FORMAT_VERSION {
        return Err(corrupt(format!(
            "line {header_no}: unsupported index format {} v{}",
            header.format, header.version
        )));
    }

    let mut angles = Vec::with_capacity(header.entry_count);
    let mut sampling = Vec::with_capacity(header.entry_count);
    let mut columns = Vec::with_capacity(header.entry_count);
    for (line_no, line_text) in lines {
        let line: AuxLine = serde_json::from_str(line_text)
            .map_err(|e| corrupt(format!("line {line_no}: malformed entry: {e}")))?;
        if line.id.index() != angles.len() {
            return Err(corrupt(format!(
                "line {line_no}: expected entry id {}, found {}",
                angles.len(),
                line.id
            )));
        }
        if line.supports.len() != header.plane_count {
            return Err(corrupt(format!(
                "line {line_no}: entry {} lists {} supports, header declares {} planes",
                line.id,
                line.supports.len(),
                header.plane_count
            )));
        }
        if (line.angle_rad.to_degrees() - line.angle_deg).abs() > ANGLE_FORM_TOLERANCE_DEG {
            return Err(corrupt(format!(
                "line {line_no}: angle_deg {} disagrees with angle_rad {}",
                line.angle_deg, line.angle_rad
            )));
        }
        angles.push(line.angle_rad);
        sampling.push(line.sampling);
        columns.push(line.supports);
    }
    if angles.len() != header.entry_count {
        return Err(corrupt(format!(
            "header declares {} entries, file holds {}",
            header.entry_count,
            angles.len()
        )));
    }
    let supports = SupportTable::from_columns(columns).map_err(|e| corrupt(e.to_string()))?;
    AuxIndex::from_parts(angles, supports, sampling).map_err(|e| corrupt(e.to_string()))
}

/// Reference to one plane file found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaneFileRef {
    pub plane: usize,
    pub id: CacheEntryId,
}

/// Result of cross-checking the index against the plane files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub entry_count: usize,
    pub plane_count: usize,
    /// Trailing entries whose plane files are missing: a commit that never
    /// reached disk. `reconcile` drops them.
    pub stale_tail: Vec<CacheEntryId>,
    /// Entries before the tail with at least one missing plane file.
    pub incomplete: Vec<CacheEntryId>,
    /// Plane files that no index entry accounts for.
    pub orphans: Vec<PlaneFileRef>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stale_tail.is_empty() && self.incomplete.is_empty() && self.orphans.is_empty()
    }
}

fn survey(
    index: &AuxIndex,
    kernels: &PersistentKernelStore,
) -> Result<ReconcileReport, StoreError> {
    let plane_count = index.plane_count();
    let complete: Vec<(CacheEntryId, bool)> = index
        .entries()
        .map(|e| (e.id, kernels.entry_complete(e.id, plane_count)))
        .collect();
    let keep = complete
        .iter()
        .rposition(|(_, ok)| *ok)
        .map_or(0, |last_complete| last_complete + 1);
    let orphans = kernels
        .list_plane_files()?
        .into_iter()
        .filter(|(plane, id)| !index.contains(*id) || *plane >= plane_count)
        .map(|(plane, id)| PlaneFileRef { plane, id })
        .collect();
    Ok(ReconcileReport {
        entry_count: index.entry_count(),
        plane_count,
        stale_tail: complete[keep..].iter().map(|(id, _)| *id).collect(),
        incomplete: complete[..keep]
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(id, _)| *id)
            .collect(),
        orphans,
    })
}

/// Owner of the auxiliary index for one storage root.
///
/// Appends and updates stay in memory until [`MetadataStore::save`]; the
/// on-disk `aux.dat` therefore only ever names entries whose planes were
/// written before the save.
///
/// A write session runs from [`MetadataStore::begin_write`] to the next
/// successful save and holds the root's writer lock throughout. Sessions
/// are refused when `aux.dat` no longer matches what this store loaded, so
/// two stores opened on the same root cannot both claim the next id.
#[derive(Debug)]
pub struct MetadataStore {
    root: PathBuf,
    index: AuxIndex,
    durable_entries: usize,
    dirty: bool,
    /// Digest of `aux.dat` as of the last load or save; `None` when absent.
    disk_digest: Option<String>,
    writer: Option<WriterLockGuard>,
}

impl MetadataStore {
    /// Opens (creating if needed) the storage root and loads its index.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        ensure_storage_root(&root)?;
        let mut store = Self {
            root,
            index: AuxIndex::empty(),
            durable_entries: 0,
            dirty: false,
            disk_digest: None,
            writer: None,
        };
        store.load()?;
        Ok(store)
    }

    /// Loads the index of an existing root without creating or probing it.
    /// Intended for inspection tooling; [`MetadataStore::save`] still takes
    /// the writer lock if called.
    pub fn open_existing(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::at(
                StoreErrorCode::StorageUnavailable,
                &root,
                "cache root does not exist or is not a directory",
            ));
        }
        let mut store = Self {
            root,
            index: AuxIndex::empty(),
            durable_entries: 0,
            dirty: false,
            disk_digest: None,
            writer: None,
        };
        store.load()?;
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn aux_path(&self) -> PathBuf {
        aux_path(&self.root)
    }

    #[must_use]
    pub fn index(&self) -> &AuxIndex {
        &self.index
    }

    /// Number of entries that the last load or save saw on disk.
    #[must_use]
    pub fn durable_entries(&self) -> usize {
        self.durable_entries
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn holds_writer_lock(&self) -> bool {
        self.writer.is_some()
    }

    /// Ids appended since the last load or save.
    pub fn pending_ids(&self) -> impl Iterator<Item = CacheEntryId> + '_ {
        self.index
            .entries()
            .skip(self.durable_entries)
            .map(|e| e.id)
    }

    /// Replaces the in-memory index with the on-disk one. A missing file
    /// yields an empty index; unsaved changes are discarded.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let path = self.aux_path();
        let (index, digest) = match fs::read_to_string(&path) {
            Ok(text) => (decode_aux(&text, &path)?, Some(sha256_hex(text.as_bytes()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no aux index yet, starting empty");
                (AuxIndex::empty(), None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(StoreError::at(
                    StoreErrorCode::CorruptMetadata,
                    &path,
                    format!("index is not valid UTF-8: {e}"),
                ))
            }
            Err(e) => return Err(StoreError::io(&path, &e)),
        };
        if self.dirty {
            warn!(
                pending = self.index.entry_count().saturating_sub(self.durable_entries),
                "discarding unsaved index changes on reload"
            );
        }
        info!(
            root = %self.root.display(),
            entries = index.entry_count(),
            planes = index.plane_count(),
            "aux index loaded"
        );
        self.durable_entries = index.entry_count();
        self.index = index;
        self.disk_digest = digest;
        self.dirty = false;
        Ok(())
    }

    /// Starts a write session: takes the writer lock unless already held and
    /// checks that `aux.dat` is unchanged since this store loaded it. Plane
    /// files for ids this store will append must only be written after this
    /// returns.
    pub fn begin_write(&mut self) -> Result<(), StoreError> {
        if self.writer.is_some() {
            return Ok(());
        }
        let guard = acquire_writer_lock(&self.root)?;
        self.ensure_index_unchanged_on_disk()?;
        debug!(lock = %guard.path().display(), "writer lock taken");
        self.writer = Some(guard);
        Ok(())
    }

    fn ensure_index_unchanged_on_disk(&self) -> Result<(), StoreError> {
        let path = self.aux_path();
        let current = match fs::read(&path) {
            Ok(bytes) => Some(sha256_hex(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io(&path, &e)),
        };
        if current != self.disk_digest {
            return Err(StoreError::at(
                StoreErrorCode::Conflict,
                &path,
                "aux index changed on disk since it was loaded; reopen the cache root",
            ));
        }
        Ok(())
    }

    /// Writes the whole index atomically inside a write session, then ends
    /// the session and releases the writer lock.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.begin_write()?;
        self.ensure_index_unchanged_on_disk()?;
        let text = encode_aux(&self.index)?;
        write_atomic_file(&self.aux_path(), text.as_bytes())?;
        info!(
            root = %self.root.display(),
            entries = self.index.entry_count(),
            newly_durable = self.index.entry_count().saturating_sub(self.durable_entries),
            "aux index saved"
        );
        self.durable_entries = self.index.entry_count();
        self.disk_digest = Some(sha256_hex(text.as_bytes()));
        self.dirty = false;
        self.writer = None;
        Ok(())
    }

    pub fn append(
        &mut self,
        angle_rad: f64,
        supports: Vec<Support>,
        sampling: f64,
    ) -> Result<CacheEntryId, StoreError> {
        let id = self
            .index
            .append(angle_rad, supports, sampling)
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        self.dirty = true;
        debug!(entry_id = %id, angle_deg = angle_rad.to_degrees(), "index entry appended");
        Ok(id)
    }

    pub fn update(
        &mut self,
        id: CacheEntryId,
        supports: Vec<Support>,
        sampling: f64,
    ) -> Result<(), StoreError> {
        self.index
            .update_entry(id, supports, sampling)
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        self.dirty = true;
        debug!(entry_id = %id, "index entry updated");
        Ok(())
    }

    /// Read-only cross-check of index and plane files.
    pub fn inspect(&self, kernels: &PersistentKernelStore) -> Result<ReconcileReport, StoreError> {
        survey(&self.index, kernels)
    }

    /// Like [`MetadataStore::inspect`], then drops the stale tail from the
    /// in-memory index. The truncation reaches disk with the next save.
    pub fn reconcile(
        &mut self,
        kernels: &PersistentKernelStore,
    ) -> Result<ReconcileReport, StoreError> {
        let report = survey(&self.index, kernels)?;
        if let Some(first) = report.stale_tail.first() {
            warn!(
                dropped = report.stale_tail.len(),
                first_dropped = %first,
                "dropping trailing index entries without plane files"
            );
            self.index.truncate(first.index());
            self.durable_entries = self.durable_entries.min(self.index.entry_count());
            self.dirty = true;
        }
        for id in &report.incomplete {
            warn!(entry_id = %id, "index entry has missing plane files");
        }
        if !report.orphans.is_empty() {
            warn!(orphans = report.orphans.len(), "plane files not covered by the index");
        }
        Ok(report)
    }
}
