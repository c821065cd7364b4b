// SPDX-License-Identifier: Apache-2.0

use num_complex::Complex32;

use crate::{CoordinateDescriptor, Support, ValidationError};

/// One w-term/frequency plane of a kernel set: one row-major `nx * ny`
/// complex array per polarization.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelPlane {
    shape: [usize; 2],
    polarizations: Vec<Vec<Complex32>>,
}

impl KernelPlane {
    pub fn new(
        shape: [usize; 2],
        polarizations: Vec<Vec<Complex32>>,
    ) -> Result<Self, ValidationError> {
        if shape[0] == 0 || shape[1] == 0 {
            return Err(ValidationError(format!(
                "kernel plane shape must be non-empty, got {shape:?}"
            )));
        }
        if polarizations.is_empty() {
            return Err(ValidationError(
                "kernel plane needs at least one polarization".to_string(),
            ));
        }
        let expected = shape[0] * shape[1];
        if let Some((pol, values)) = polarizations
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != expected)
        {
            return Err(ValidationError(format!(
                "polarization {pol} holds {} samples, shape {shape:?} needs {expected}",
                values.len()
            )));
        }
        Ok(Self {
            shape,
            polarizations,
        })
    }

    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    #[must_use]
    pub fn polarization_count(&self) -> usize {
        self.polarizations.len()
    }

    #[must_use]
    pub fn polarization(&self, index: usize) -> Option<&[Complex32]> {
        self.polarizations.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn polarizations(&self) -> &[Vec<Complex32>] {
        &self.polarizations
    }

    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.polarizations.len() * self.shape[0] * self.shape[1] * std::mem::size_of::<Complex32>()
    }

    #[must_use]
    pub fn into_polarizations(self) -> Vec<Vec<Complex32>> {
        self.polarizations
    }
}

/// Materialized payload of one cache entry: every plane plus the coordinate
/// descriptor that aligns it with the target grid.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelPlaneSet {
    planes: Vec<KernelPlane>,
    coordinates: CoordinateDescriptor,
}

impl KernelPlaneSet {
    pub fn new(
        planes: Vec<KernelPlane>,
        coordinates: CoordinateDescriptor,
    ) -> Result<Self, ValidationError> {
        let first = planes
            .first()
            .ok_or_else(|| ValidationError("kernel set needs at least one plane".to_string()))?;
        let pols = first.polarization_count();
        if let Some(plane) = planes.iter().position(|p| p.polarization_count() != pols) {
            return Err(ValidationError(format!(
                "plane {plane} has {} polarizations, plane 0 has {pols}",
                planes[plane].polarization_count()
            )));
        }
        Ok(Self {
            planes,
            coordinates,
        })
    }

    #[must_use]
    pub fn planes(&self) -> &[KernelPlane] {
        &self.planes
    }

    #[must_use]
    pub fn plane(&self, index: usize) -> Option<&KernelPlane> {
        self.planes.get(index)
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    #[must_use]
    pub fn polarization_count(&self) -> usize {
        self.planes.first().map_or(0, KernelPlane::polarization_count)
    }

    #[must_use]
    pub fn coordinates(&self) -> &CoordinateDescriptor {
        &self.coordinates
    }

    #[must_use]
    pub fn reference_frequency_hz(&self) -> f64 {
        self.coordinates.reference_frequency_hz
    }

    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.planes.iter().map(KernelPlane::payload_bytes).sum()
    }
}

/// Output of the kernel computation service for one rotation angle.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedKernel {
    pub planes: Vec<KernelPlane>,
    pub supports: Vec<Support>,
    pub sampling: f64,
}

#[cfg(test)]
mod tests {
    use super::{KernelPlane, KernelPlaneSet};
    use crate::CoordinateDescriptor;
    use num_complex::Complex32;

    fn coords() -> CoordinateDescriptor {
        CoordinateDescriptor {
            origin: [0, 0],
            reference_pixel: [2.0, 2.0],
            reference_value: [0.0, 0.0],
            increment: [1.0, 1.0],
            reference_frequency_hz: 1.4e9,
        }
    }

    fn plane(pols: usize) -> KernelPlane {
        KernelPlane::new([2, 2], vec![vec![Complex32::new(1.0, 0.5); 4]; pols]).expect("plane")
    }

    #[test]
    fn plane_rejects_wrong_sample_count() {
        let err = KernelPlane::new([2, 3], vec![vec![Complex32::new(0.0, 0.0); 5]])
            .expect_err("short polarization");
        assert!(err.0.contains("needs 6"), "{}", err.0);
        assert!(KernelPlane::new([0, 3], vec![vec![]]).is_err());
        assert!(KernelPlane::new([1, 1], vec![]).is_err());
    }

    #[test]
    fn set_requires_consistent_polarizations() {
        assert!(KernelPlaneSet::new(vec![], coords()).is_err());
        assert!(KernelPlaneSet::new(vec![plane(2), plane(1)], coords()).is_err());
        let set = KernelPlaneSet::new(vec![plane(2), plane(2)], coords()).expect("set");
        assert_eq!(set.plane_count(), 2);
        assert_eq!(set.polarization_count(), 2);
        assert_eq!(set.payload_bytes(), 2 * 2 * 4 * 8);
        assert_eq!(set.reference_frequency_hz(), 1.4e9);
    }
}
