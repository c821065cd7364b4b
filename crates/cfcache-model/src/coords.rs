// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Coordinate metadata stored alongside every persisted kernel plane and the
/// aggregate image, so a loaded array can be re-aligned with the target grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinateDescriptor {
    /// Pixel origin of the array within its parent grid.
    pub origin: [i64; 2],
    pub reference_pixel: [f64; 2],
    pub reference_value: [f64; 2],
    /// Axis increments (uv wavelengths per pixel for kernel planes).
    pub increment: [f64; 2],
    pub reference_frequency_hz: f64,
}

impl CoordinateDescriptor {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let finite = self
            .reference_pixel
            .iter()
            .chain(&self.reference_value)
            .chain(&self.increment)
            .all(|v| v.is_finite());
        if !finite || !self.reference_frequency_hz.is_finite() {
            return Err(ValidationError(
                "coordinate descriptor contains non-finite values".to_string(),
            ));
        }
        if self.increment.iter().any(|v| *v == 0.0) {
            return Err(ValidationError(
                "coordinate descriptor increments must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sky-plane coordinate system of the target image grid that kernels are
/// applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridCoordinates {
    pub shape: [usize; 2],
    /// Cell size in radians.
    pub increment_rad: [f64; 2],
    pub reference_pixel: [f64; 2],
    pub reference_value_rad: [f64; 2],
    pub reference_frequency_hz: f64,
}

impl GridCoordinates {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shape.iter().any(|n| *n == 0) {
            return Err(ValidationError("grid shape must be non-empty".to_string()));
        }
        if self
            .increment_rad
            .iter()
            .any(|v| !v.is_finite() || *v == 0.0)
        {
            return Err(ValidationError(
                "grid increments must be finite and non-zero".to_string(),
            ));
        }
        if !self.reference_frequency_hz.is_finite() || self.reference_frequency_hz <= 0.0 {
            return Err(ValidationError(
                "grid reference frequency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
