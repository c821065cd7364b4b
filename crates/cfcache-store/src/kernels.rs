// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cfcache_model::{
    AggregateImage, CacheEntryId, CoordinateDescriptor, ImageRecord, KernelPlane, KernelPlaneSet,
};
use tracing::{debug, info};

use crate::codec::{ImageCodec, JsonImageCodec};
use crate::paths::{
    aggregate_path, parse_plane_file_name, path_for, validate_file_component,
    DEFAULT_AGGREGATE_NAME, DEFAULT_PLANE_PREFIX,
};
use crate::{StoreError, StoreErrorCode};

/// Durable home of kernel planes: one image file per (plane, entry) pair
/// plus the optional run-wide aggregate image.
#[derive(Clone)]
pub struct PersistentKernelStore {
    root: PathBuf,
    prefix: String,
    aggregate_name: String,
    codec: Arc<dyn ImageCodec>,
}

impl std::fmt::Debug for PersistentKernelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentKernelStore")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("aggregate_name", &self.aggregate_name)
            .finish_non_exhaustive()
    }
}

impl PersistentKernelStore {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Result<Self, StoreError> {
        validate_file_component("plane prefix", prefix)?;
        Ok(Self {
            root: root.into(),
            prefix: prefix.to_string(),
            aggregate_name: DEFAULT_AGGREGATE_NAME.to_string(),
            codec: Arc::new(JsonImageCodec),
        })
    }

    pub fn with_defaults(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(root, DEFAULT_PLANE_PREFIX)
    }

    pub fn with_aggregate_name(mut self, name: &str) -> Result<Self, StoreError> {
        validate_file_component("aggregate name", name)?;
        if parse_plane_file_name(&self.prefix, name).is_some() {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                format!("aggregate name {name:?} collides with plane file names"),
            ));
        }
        self.aggregate_name = name.to_string();
        Ok(self)
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn aggregate_name(&self) -> &str {
        &self.aggregate_name
    }

    #[must_use]
    pub fn plane_path(&self, plane: usize, id: CacheEntryId) -> PathBuf {
        path_for(&self.root, &self.prefix, plane, id)
    }

    /// Persists one plane of entry `id`, replacing any previous file.
    pub fn store(
        &self,
        id: CacheEntryId,
        plane: usize,
        kernel: &KernelPlane,
        coordinates: &CoordinateDescriptor,
    ) -> Result<(), StoreError> {
        let path = self.plane_path(plane, id);
        let record = ImageRecord::from_kernel_plane(kernel, coordinates.clone());
        self.codec.write_image(&path, &record)?;
        debug!(
            entry_id = %id,
            plane,
            shape = ?kernel.shape(),
            polarizations = kernel.polarization_count(),
            "kernel plane stored"
        );
        Ok(())
    }

    /// Loads every plane of entry `id`. A missing plane, or planes that
    /// disagree on polarization count, yield [`StoreErrorCode::IncompleteEntry`].
    pub fn load(&self, id: CacheEntryId, plane_count: usize) -> Result<KernelPlaneSet, StoreError> {
        if plane_count == 0 {
            return Err(StoreError::new(
                StoreErrorCode::IncompleteEntry,
                format!("entry {id} has no planes recorded"),
            ));
        }
        let mut planes = Vec::with_capacity(plane_count);
        let mut coordinates = None;
        for plane in 0..plane_count {
            let path = self.plane_path(plane, id);
            let record = self.codec.read_image(&path).map_err(|e| {
                if e.code == StoreErrorCode::NotFound {
                    StoreError::at(
                        StoreErrorCode::IncompleteEntry,
                        &path,
                        format!("entry {id} is missing plane {plane}"),
                    )
                } else {
                    e
                }
            })?;
            let (kernel, coords) = record.into_kernel_plane().map_err(|e| {
                StoreError::at(StoreErrorCode::CorruptPayload, &path, e.to_string())
            })?;
            if let Some(first) = planes.first().map(KernelPlane::polarization_count) {
                if kernel.polarization_count() != first {
                    return Err(StoreError::at(
                        StoreErrorCode::IncompleteEntry,
                        &path,
                        format!(
                            "entry {id} plane {plane} has {} polarizations, plane 0 has {first}",
                            kernel.polarization_count()
                        ),
                    ));
                }
            }
            debug!(
                entry_id = %id,
                plane,
                support = ?kernel.shape(),
                reference_frequency_hz = coords.reference_frequency_hz,
                "kernel plane loaded"
            );
            coordinates.get_or_insert(coords);
            planes.push(kernel);
        }
        let coordinates = coordinates.ok_or_else(|| {
            StoreError::new(StoreErrorCode::Internal, "no coordinates after loading planes")
        })?;
        let set = KernelPlaneSet::new(planes, coordinates)
            .map_err(|e| StoreError::new(StoreErrorCode::IncompleteEntry, e.to_string()))?;
        info!(
            entry_id = %id,
            planes = set.plane_count(),
            polarizations = set.polarization_count(),
            payload_bytes = set.payload_bytes(),
            "kernel set loaded from disk"
        );
        Ok(set)
    }

    #[must_use]
    pub fn plane_exists(&self, plane: usize, id: CacheEntryId) -> bool {
        self.plane_path(plane, id).is_file()
    }

    /// True when every one of `plane_count` plane files for `id` exists.
    #[must_use]
    pub fn entry_complete(&self, id: CacheEntryId, plane_count: usize) -> bool {
        plane_count > 0 && (0..plane_count).all(|plane| self.plane_exists(plane, id))
    }

    /// All plane files under the root, sorted by entry then plane.
    pub fn list_plane_files(&self) -> Result<Vec<(usize, CacheEntryId)>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, &e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, &e))?;
            let name = entry.file_name();
            if let Some(parsed) = parse_plane_file_name(&self.prefix, &name.to_string_lossy()) {
                out.push(parsed);
            }
        }
        out.sort_by_key(|(plane, id)| (*id, *plane));
        Ok(out)
    }

    pub fn store_aggregate(&self, image: &AggregateImage) -> Result<(), StoreError> {
        let path = aggregate_path(&self.root, &self.aggregate_name);
        self.codec.write_image(&path, &image.to_record())?;
        info!(name = %self.aggregate_name, shape = ?image.shape(), "aggregate image stored");
        Ok(())
    }

    /// `Ok(None)` when no aggregate has been stored yet.
    pub fn load_aggregate(&self) -> Result<Option<AggregateImage>, StoreError> {
        let path = aggregate_path(&self.root, &self.aggregate_name);
        let record = match self.codec.read_image(&path) {
            Ok(record) => record,
            Err(e) if e.code == StoreErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        AggregateImage::from_record(record)
            .map(Some)
            .map_err(|e| StoreError::at(StoreErrorCode::CorruptPayload, &path, e.to_string()))
    }

    #[must_use]
    pub fn aggregate_exists(&self) -> bool {
        aggregate_path(&self.root, &self.aggregate_name).is_file()
    }
}
