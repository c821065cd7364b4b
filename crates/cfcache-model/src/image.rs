// SPDX-License-Identifier: Apache-2.0

use num_complex::Complex32;

use crate::{CoordinateDescriptor, KernelPlane, ValidationError};

/// Typed pixel payload of an image container.
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    Complex(Vec<Complex32>),
    Real(Vec<f32>),
}

impl Pixels {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Complex(v) => v.len(),
            Self::Real(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Complex(_) => "complex32",
            Self::Real(_) => "float32",
        }
    }
}

/// An n-dimensional array with embedded coordinate metadata, as read and
/// written by an image codec.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub shape: Vec<usize>,
    pub pixels: Pixels,
    pub coordinates: CoordinateDescriptor,
}

impl ImageRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shape.is_empty() || self.shape.iter().any(|n| *n == 0) {
            return Err(ValidationError(format!(
                "image shape must be non-empty, got {:?}",
                self.shape
            )));
        }
        let expected: usize = self.shape.iter().product();
        if expected != self.pixels.len() {
            return Err(ValidationError(format!(
                "image shape {:?} needs {expected} pixels, payload has {}",
                self.shape,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// Packs a kernel plane as a `[nx, ny, npol]` complex cube.
    #[must_use]
    pub fn from_kernel_plane(plane: &KernelPlane, coordinates: CoordinateDescriptor) -> Self {
        let [nx, ny] = plane.shape();
        let values: Vec<Complex32> = plane.polarizations().iter().flatten().copied().collect();
        Self {
            shape: vec![nx, ny, plane.polarization_count()],
            pixels: Pixels::Complex(values),
            coordinates,
        }
    }

    /// Unpacks a `[nx, ny, npol]` complex cube; the third axis is the
    /// polarization count.
    pub fn into_kernel_plane(self) -> Result<(KernelPlane, CoordinateDescriptor), ValidationError> {
        self.validate()?;
        let [nx, ny, npol] = match self.shape.as_slice() {
            [nx, ny, npol] => [*nx, *ny, *npol],
            other => {
                return Err(ValidationError(format!(
                    "kernel plane image must be 3-dimensional, got shape {other:?}"
                )))
            }
        };
        let values = match self.pixels {
            Pixels::Complex(values) => values,
            Pixels::Real(_) => {
                return Err(ValidationError(
                    "kernel plane image must hold complex pixels".to_string(),
                ))
            }
        };
        let polarizations: Vec<Vec<Complex32>> = values
            .chunks(nx * ny)
            .take(npol)
            .map(<[Complex32]>::to_vec)
            .collect();
        let plane = KernelPlane::new([nx, ny], polarizations)?;
        Ok((plane, self.coordinates))
    }
}

/// Run-wide aggregate (for example the average primary beam), persisted as a
/// single real-valued image independent of the per-angle entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateImage {
    shape: Vec<usize>,
    pixels: Vec<f32>,
    coordinates: CoordinateDescriptor,
}

impl AggregateImage {
    pub fn new(
        shape: Vec<usize>,
        pixels: Vec<f32>,
        coordinates: CoordinateDescriptor,
    ) -> Result<Self, ValidationError> {
        let image = Self {
            shape,
            pixels,
            coordinates,
        };
        image.to_record().validate()?;
        Ok(image)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    #[must_use]
    pub fn coordinates(&self) -> &CoordinateDescriptor {
        &self.coordinates
    }

    #[must_use]
    pub fn to_record(&self) -> ImageRecord {
        ImageRecord {
            shape: self.shape.clone(),
            pixels: Pixels::Real(self.pixels.clone()),
            coordinates: self.coordinates.clone(),
        }
    }

    pub fn from_record(record: ImageRecord) -> Result<Self, ValidationError> {
        record.validate()?;
        match record.pixels {
            Pixels::Real(pixels) => Ok(Self {
                shape: record.shape,
                pixels,
                coordinates: record.coordinates,
            }),
            Pixels::Complex(_) => Err(ValidationError(
                "aggregate image must hold real pixels".to_string(),
            )),
        }
    }
}
