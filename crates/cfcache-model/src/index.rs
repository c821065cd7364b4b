// SPDX-License-Identifier: Apache-2.0

use crate::{CacheEntryId, Support, SupportTable, ValidationError};

/// One row of the auxiliary index, joined across its aligned structures.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: CacheEntryId,
    pub angle_rad: f64,
    pub supports: Vec<Support>,
    pub sampling: f64,
}

impl IndexEntry {
    #[must_use]
    pub fn angle_deg(&self) -> f64 {
        self.angle_rad.to_degrees()
    }
}

/// Rotation angles, per-plane supports and sampling factors, kept aligned on
/// [`CacheEntryId`].
///
/// Invariant: `angles.len() == supports.entry_count() == sampling.len()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuxIndex {
    angles: Vec<f64>,
    supports: SupportTable,
    sampling: Vec<f64>,
}

impl AuxIndex {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(
        angles: Vec<f64>,
        supports: SupportTable,
        sampling: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        let index = Self {
            angles,
            supports,
            sampling,
        };
        index.validate_alignment()?;
        for (i, (angle, sampling)) in index.angles.iter().zip(&index.sampling).enumerate() {
            check_angle(*angle).map_err(|e| ValidationError(format!("entry {i}: {}", e.0)))?;
            check_sampling(*sampling).map_err(|e| ValidationError(format!("entry {i}: {}", e.0)))?;
        }
        Ok(index)
    }

    pub fn validate_alignment(&self) -> Result<(), ValidationError> {
        let n = self.angles.len();
        if self.supports.entry_count() != n {
            return Err(ValidationError(format!(
                "support table has {} columns but index has {n} angles",
                self.supports.entry_count()
            )));
        }
        if self.sampling.len() != n {
            return Err(ValidationError(format!(
                "sampling list has {} values but index has {n} angles",
                self.sampling.len()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.angles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.supports.plane_count()
    }

    #[must_use]
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    #[must_use]
    pub fn supports(&self) -> &SupportTable {
        &self.supports
    }

    #[must_use]
    pub fn sampling(&self) -> &[f64] {
        &self.sampling
    }

    #[must_use]
    pub fn contains(&self, id: CacheEntryId) -> bool {
        id.index() < self.angles.len()
    }

    #[must_use]
    pub fn entry(&self, id: CacheEntryId) -> Option<IndexEntry> {
        let i = id.index();
        Some(IndexEntry {
            id,
            angle_rad: *self.angles.get(i)?,
            supports: self.supports.column(id)?.to_vec(),
            sampling: *self.sampling.get(i)?,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        (0..self.angles.len()).filter_map(|i| self.entry(CacheEntryId::from_index(i).ok()?))
    }

    pub fn next_id(&self) -> Result<CacheEntryId, ValidationError> {
        CacheEntryId::from_index(self.angles.len())
    }

    /// Appends a new entry to all aligned structures at once.
    pub fn append(
        &mut self,
        angle_rad: f64,
        supports: Vec<Support>,
        sampling: f64,
    ) -> Result<CacheEntryId, ValidationError> {
        check_angle(angle_rad)?;
        check_sampling(sampling)?;
        let id = self.next_id()?;
        self.supports.push_column(supports)?;
        self.angles.push(angle_rad);
        self.sampling.push(sampling);
        Ok(id)
    }

    /// Replaces supports and sampling of an existing entry; the angle is kept.
    pub fn update_entry(
        &mut self,
        id: CacheEntryId,
        supports: Vec<Support>,
        sampling: f64,
    ) -> Result<(), ValidationError> {
        check_sampling(sampling)?;
        let slot = self
            .sampling
            .get_mut(id.index())
            .ok_or_else(|| ValidationError(format!("entry {id} is not in the index")))?;
        self.supports.replace_column(id, supports)?;
        *slot = sampling;
        Ok(())
    }

    pub fn truncate(&mut self, entry_count: usize) {
        self.angles.truncate(entry_count);
        self.supports.truncate(entry_count);
        self.sampling.truncate(entry_count);
    }
}

/// Stored angles are also written in degrees, so the degree form must be
/// finite too.
fn check_angle(angle_rad: f64) -> Result<(), ValidationError> {
    if !angle_rad.is_finite() || !angle_rad.to_degrees().is_finite() {
        return Err(ValidationError(format!(
            "rotation angle must be finite in radians and degrees, got {angle_rad}"
        )));
    }
    Ok(())
}

fn check_sampling(sampling: f64) -> Result<(), ValidationError> {
    if !sampling.is_finite() || sampling <= 0.0 {
        return Err(ValidationError(format!(
            "sampling factor must be finite and positive, got {sampling}"
        )));
    }
    Ok(())
}
