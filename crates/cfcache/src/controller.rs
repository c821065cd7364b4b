// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use cfcache_model::{
    AggregateImage, AuxIndex, CacheEntryId, GridCoordinates, KernelPlane, KernelPlaneSet, Support,
};
use cfcache_store::{
    ImageCodec, JsonImageCodec, MetadataStore, PersistentKernelStore, ReconcileReport,
};
use tracing::{debug, info, warn};

use crate::collaborators::{
    kernel_centre, FourierRemap, KernelSource, OversampledUvRemap, RotationAngleEstimator,
};
use crate::matching::{search, MatchOutcome};
use crate::{CacheConfig, CacheError, MemoryTier};

/// Where a located kernel set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Memory,
    Disk,
    /// Freshly computed by [`KernelCache::find_or_compute`].
    Computed,
}

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub id: CacheEntryId,
    pub source: HitSource,
    pub kernels: Arc<KernelPlaneSet>,
    pub supports: Vec<Support>,
    pub sampling: f64,
    /// Stored rotation angle of the matched entry, radians.
    pub angle_rad: f64,
}

#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(CacheHit),
    Miss,
}

impl CacheLookup {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    #[must_use]
    pub fn into_hit(self) -> Option<CacheHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss => None,
        }
    }
}

/// Whether a commit opens a new rotation-angle bucket or refills an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleBucket {
    New,
    Existing(CacheEntryId),
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub planes: Vec<KernelPlane>,
    pub grid: GridCoordinates,
    pub supports: Vec<Support>,
    pub sampling: f64,
    /// Ignored for [`AngleBucket::Existing`]; the stored angle is kept.
    pub angle_rad: f64,
    pub bucket: AngleBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unregistered,
    /// Planes written and index appended, but not yet finalized.
    CommittedInMemory,
    /// Named by the on-disk index; payload not resident.
    Durable,
    LoadedInMemoryTier,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub commits: u64,
    pub finalizes: u64,
}

/// Two-tier convolution-kernel cache over one storage root.
///
/// Lookups promote entries from disk into the memory tier on first use.
/// Commits write plane files immediately but only reach the index on disk at
/// [`KernelCache::finalize`].
pub struct KernelCache {
    config: CacheConfig,
    metadata: MetadataStore,
    kernels: PersistentKernelStore,
    memory: MemoryTier,
    remap: Box<dyn FourierRemap + Send>,
    unfinalized: BTreeSet<CacheEntryId>,
    stats: CacheStats,
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("root", &self.config.root)
            .field("entries", &self.metadata.index().entry_count())
            .field("loaded", &self.memory.loaded_count())
            .field("unfinalized", &self.unfinalized)
            .finish_non_exhaustive()
    }
}

impl KernelCache {
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        Self::open_with(config, Arc::new(JsonImageCodec), Box::new(OversampledUvRemap))
    }

    pub fn open_with(
        config: CacheConfig,
        codec: Arc<dyn ImageCodec>,
        remap: Box<dyn FourierRemap + Send>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let mut metadata = MetadataStore::open(&config.root)?;
        let kernels = PersistentKernelStore::new(&config.root, &config.plane_prefix)?
            .with_aggregate_name(&config.aggregate_name)?
            .with_codec(codec);
        if config.verify_on_open {
            let report = metadata.reconcile(&kernels)?;
            if !report.is_clean() {
                warn!(
                    root = %config.root.display(),
                    stale_tail = report.stale_tail.len(),
                    incomplete = report.incomplete.len(),
                    orphans = report.orphans.len(),
                    "kernel cache opened with integrity findings"
                );
            }
        }
        info!(
            root = %config.root.display(),
            entries = metadata.index().entry_count(),
            planes = metadata.index().plane_count(),
            "kernel cache opened"
        );
        Ok(Self {
            config,
            metadata,
            kernels,
            memory: MemoryTier::new(),
            remap,
            unfinalized: BTreeSet::new(),
            stats: CacheStats::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    #[must_use]
    pub fn index(&self) -> &AuxIndex {
        self.metadata.index()
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Ids committed since the last successful finalize.
    #[must_use]
    pub fn unfinalized(&self) -> Vec<CacheEntryId> {
        self.unfinalized.iter().copied().collect()
    }

    /// Finds the entry nearest to `angle_rad` within `tolerance_rad` and
    /// returns its kernels, loading them from disk on first use.
    pub fn locate(
        &mut self,
        angle_rad: f64,
        tolerance_rad: f64,
    ) -> Result<CacheLookup, CacheError> {
        match search(self.metadata.index().angles(), angle_rad, tolerance_rad) {
            MatchOutcome::Found(id) => self.resolve(id).map(CacheLookup::Hit),
            MatchOutcome::NotFound => {
                self.stats.misses += 1;
                debug!(
                    angle_deg = angle_rad.to_degrees(),
                    tolerance_deg = tolerance_rad.to_degrees(),
                    "kernel cache miss"
                );
                Ok(CacheLookup::Miss)
            }
        }
    }

    /// [`KernelCache::locate`] with the configured default tolerance.
    pub fn locate_default(&mut self, angle_rad: f64) -> Result<CacheLookup, CacheError> {
        let tolerance = self.config.default_tolerance_rad();
        self.locate(angle_rad, tolerance)
    }

    pub fn locate_with<C: ?Sized>(
        &mut self,
        estimator: &impl RotationAngleEstimator<C>,
        context: &C,
        tolerance_rad: f64,
    ) -> Result<CacheLookup, CacheError> {
        let angle = estimator.angle_for(context);
        self.locate(angle, tolerance_rad)
    }

    fn resolve(&mut self, id: CacheEntryId) -> Result<CacheHit, CacheError> {
        let entry = self.metadata.index().entry(id).ok_or_else(|| {
            CacheError::Internal(format!("matched entry {id} is missing from the index"))
        })?;
        let (kernels, source) = match self.memory.get(id) {
            Some(set) => {
                self.stats.memory_hits += 1;
                debug!(entry_id = %id, "kernel set served from memory");
                (set, HitSource::Memory)
            }
            None => {
                let set = Arc::new(self.kernels.load(id, self.metadata.index().plane_count())?);
                self.memory.put(id, Arc::clone(&set));
                self.stats.disk_hits += 1;
                info!(
                    entry_id = %id,
                    angle_deg = entry.angle_deg(),
                    supports = ?entry.supports,
                    sampling = entry.sampling,
                    resident_bytes = self.memory.payload_bytes(),
                    "kernel set promoted from disk"
                );
                (set, HitSource::Disk)
            }
        };
        Ok(CacheHit {
            id,
            source,
            kernels,
            supports: entry.supports,
            sampling: entry.sampling,
            angle_rad: entry.angle_rad,
        })
    }

    fn check_request(&self, request: &CommitRequest) -> Result<(), CacheError> {
        if request.planes.is_empty() {
            return Err(CacheError::invalid("commit needs at least one plane"));
        }
        if !request.angle_rad.is_finite() || !request.angle_rad.to_degrees().is_finite() {
            return Err(CacheError::invalid(format!(
                "rotation angle must be finite in radians and degrees, got {}",
                request.angle_rad
            )));
        }
        if !request.sampling.is_finite() || request.sampling <= 0.0 {
            return Err(CacheError::invalid(format!(
                "sampling must be finite and positive, got {}",
                request.sampling
            )));
        }
        if request.supports.len() != request.planes.len() {
            return Err(CacheError::invalid(format!(
                "commit has {} planes but {} supports",
                request.planes.len(),
                request.supports.len()
            )));
        }
        let index = self.metadata.index();
        if !index.is_empty() && request.planes.len() != index.plane_count() {
            return Err(CacheError::invalid(format!(
                "commit has {} planes, cache holds {} per entry",
                request.planes.len(),
                index.plane_count()
            )));
        }
        if let AngleBucket::Existing(id) = request.bucket {
            if !index.contains(id) {
                return Err(CacheError::invalid(format!(
                    "existing bucket {id} is not in the index"
                )));
            }
        }
        Ok(())
    }

    /// Writes every plane to disk, records the entry in the in-memory index
    /// and installs the set in the memory tier. Nothing becomes durable until
    /// [`KernelCache::finalize`].
    ///
    /// The first commit after open or finalize takes the root's writer lock
    /// and holds it until the next finalize. It fails with a conflict when
    /// another writer holds the lock or has finalized since this cache
    /// loaded its index; no plane file is touched in either case.
    pub fn commit(&mut self, request: CommitRequest) -> Result<CacheEntryId, CacheError> {
        self.check_request(&request)?;
        let CommitRequest {
            planes,
            grid,
            supports,
            sampling,
            angle_rad,
            bucket,
        } = request;

        let descriptors = planes
            .iter()
            .map(|plane| {
                self.remap.remap_to_fourier_domain(
                    &grid,
                    plane.shape(),
                    kernel_centre(plane.shape()),
                    sampling,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let coordinates = descriptors
            .first()
            .cloned()
            .ok_or_else(|| CacheError::invalid("commit needs at least one plane"))?;
        let set = KernelPlaneSet::new(planes, coordinates)?;

        self.metadata.begin_write()?;
        let id = match bucket {
            AngleBucket::New => self.metadata.index().next_id()?,
            AngleBucket::Existing(id) => id,
        };
        for (plane_index, (plane, descriptor)) in set.planes().iter().zip(&descriptors).enumerate()
        {
            self.kernels.store(id, plane_index, plane, descriptor)?;
        }
        match bucket {
            AngleBucket::New => {
                let appended = self.metadata.append(angle_rad, supports, sampling)?;
                if appended != id {
                    return Err(CacheError::Internal(format!(
                        "index assigned id {appended}, planes were written for {id}"
                    )));
                }
            }
            AngleBucket::Existing(id) => self.metadata.update(id, supports, sampling)?,
        }

        let plane_count = set.plane_count();
        self.memory.put(id, Arc::new(set));
        self.unfinalized.insert(id);
        self.stats.commits += 1;
        info!(
            entry_id = %id,
            new_bucket = matches!(bucket, AngleBucket::New),
            angle_deg = angle_rad.to_degrees(),
            planes = plane_count,
            resident_bytes = self.memory.payload_bytes(),
            "kernel set committed"
        );
        Ok(id)
    }

    /// Persists the index and releases the writer lock. The only point at
    /// which appended entries become durable.
    pub fn finalize(&mut self) -> Result<(), CacheError> {
        self.metadata.save()?;
        self.stats.finalizes += 1;
        info!(
            root = %self.config.root.display(),
            entries = self.metadata.index().entry_count(),
            newly_durable = self.unfinalized.len(),
            resident_sets = self.memory.loaded_count(),
            resident_bytes = self.memory.payload_bytes(),
            "kernel cache finalized"
        );
        self.unfinalized.clear();
        Ok(())
    }

    /// Stores the run-wide aggregate image, then finalizes.
    pub fn finalize_with_aggregate(&mut self, image: &AggregateImage) -> Result<(), CacheError> {
        self.metadata.begin_write()?;
        self.kernels.store_aggregate(image)?;
        self.finalize()
    }

    pub fn load_aggregate(&self) -> Result<Option<AggregateImage>, CacheError> {
        Ok(self.kernels.load_aggregate()?)
    }

    #[must_use]
    pub fn aggregate_ready(&self) -> bool {
        self.kernels.aggregate_exists()
    }

    #[must_use]
    pub fn entry_state(&self, id: CacheEntryId) -> EntryState {
        if !self.metadata.index().contains(id) {
            EntryState::Unregistered
        } else if self.unfinalized.contains(&id) || id.index() >= self.metadata.durable_entries() {
            EntryState::CommittedInMemory
        } else if self.memory.is_loaded(id) {
            EntryState::LoadedInMemoryTier
        } else {
            EntryState::Durable
        }
    }

    /// Read-only cross-check of the index against the plane files on disk.
    pub fn verify(&self) -> Result<ReconcileReport, CacheError> {
        Ok(self.metadata.inspect(&self.kernels)?)
    }

    /// Locates `angle_rad`; on a miss computes a new kernel set through
    /// `source`, commits it as a new bucket and finalizes. An entry whose
    /// plane files are incomplete is recomputed into its existing id.
    pub fn find_or_compute(
        &mut self,
        angle_rad: f64,
        tolerance_rad: f64,
        grid: &GridCoordinates,
        source: &mut impl KernelSource,
    ) -> Result<CacheHit, CacheError> {
        let (bucket, compute_angle) =
            match search(self.metadata.index().angles(), angle_rad, tolerance_rad) {
                MatchOutcome::Found(id) => match self.resolve(id) {
                    Ok(hit) => return Ok(hit),
                    Err(e) if e.is_recoverable() => {
                        let stored = self
                            .metadata
                            .index()
                            .angles()
                            .get(id.index())
                            .copied()
                            .unwrap_or(angle_rad);
                        warn!(entry_id = %id, error = %e, "recomputing incomplete kernel set");
                        (AngleBucket::Existing(id), stored)
                    }
                    Err(e) => return Err(e),
                },
                MatchOutcome::NotFound => {
                    self.stats.misses += 1;
                    (AngleBucket::New, angle_rad)
                }
            };

        let computed = source.compute(compute_angle)?;
        let id = self.commit(CommitRequest {
            planes: computed.planes,
            grid: grid.clone(),
            supports: computed.supports,
            sampling: computed.sampling,
            angle_rad: compute_angle,
            bucket,
        })?;
        self.finalize()?;

        let entry = self.metadata.index().entry(id).ok_or_else(|| {
            CacheError::Internal(format!("committed entry {id} is missing from the index"))
        })?;
        let kernels = self.memory.get(id).ok_or_else(|| {
            CacheError::Internal(format!("committed entry {id} is not resident"))
        })?;
        Ok(CacheHit {
            id,
            source: HitSource::Computed,
            kernels,
            supports: entry.supports,
            sampling: entry.sampling,
            angle_rad: entry.angle_rad,
        })
    }
}

impl Drop for KernelCache {
    fn drop(&mut self) {
        if !self.unfinalized.is_empty() {
            warn!(
                root = %self.config.root.display(),
                unfinalized = ?self.unfinalized,
                "kernel cache dropped with commits that were never finalized"
            );
        }
    }
}
