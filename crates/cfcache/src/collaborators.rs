// SPDX-License-Identifier: Apache-2.0

//! Seams to the numerical parts of the imaging pipeline. The cache decides
//! when to compute and where to store; these traits do the computing.

use cfcache_model::{ComputedKernel, CoordinateDescriptor, GridCoordinates};

use crate::CacheError;

/// Produces a fresh kernel set for one rotation angle (radians).
pub trait KernelSource {
    fn compute(&mut self, angle_rad: f64) -> Result<ComputedKernel, CacheError>;
}

impl<F> KernelSource for F
where
    F: FnMut(f64) -> Result<ComputedKernel, CacheError>,
{
    fn compute(&mut self, angle_rad: f64) -> Result<ComputedKernel, CacheError> {
        self(angle_rad)
    }
}

/// Derives the sky-rotation angle (radians) from caller context such as a
/// visibility buffer.
pub trait RotationAngleEstimator<C: ?Sized> {
    fn angle_for(&self, context: &C) -> f64;
}

impl<C: ?Sized, F> RotationAngleEstimator<C> for F
where
    F: Fn(&C) -> f64,
{
    fn angle_for(&self, context: &C) -> f64 {
        self(context)
    }
}

/// Maps the sky-plane grid coordinates onto the oversampled uv coordinates of
/// a kernel plane.
pub trait FourierRemap {
    fn remap_to_fourier_domain(
        &self,
        grid: &GridCoordinates,
        kernel_shape: [usize; 2],
        reference_pixel: [f64; 2],
        sampling: f64,
    ) -> Result<CoordinateDescriptor, CacheError>;
}

/// uv increment `1 / (n * cell) / sampling` per axis, reference value zero at
/// the given reference pixel.
#[derive(Debug, Default, Clone, Copy)]
pub struct OversampledUvRemap;

impl FourierRemap for OversampledUvRemap {
    fn remap_to_fourier_domain(
        &self,
        grid: &GridCoordinates,
        kernel_shape: [usize; 2],
        reference_pixel: [f64; 2],
        sampling: f64,
    ) -> Result<CoordinateDescriptor, CacheError> {
        grid.validate()?;
        if !sampling.is_finite() || sampling <= 0.0 {
            return Err(CacheError::invalid(format!(
                "sampling must be finite and positive, got {sampling}"
            )));
        }
        if kernel_shape.iter().any(|n| *n == 0) {
            return Err(CacheError::invalid("kernel shape must be non-empty"));
        }
        let increment = [0, 1].map(|axis| {
            1.0 / (grid.shape[axis] as f64 * grid.increment_rad[axis]) / sampling
        });
        let descriptor = CoordinateDescriptor {
            origin: [0, 0],
            reference_pixel,
            reference_value: [0.0, 0.0],
            increment,
            reference_frequency_hz: grid.reference_frequency_hz,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Centre pixel of a kernel plane, the conventional uv origin.
#[must_use]
pub fn kernel_centre(kernel_shape: [usize; 2]) -> [f64; 2] {
    kernel_shape.map(|n| (n / 2) as f64)
}

#[cfg(test)]
mod tests {
    use super::{kernel_centre, FourierRemap, OversampledUvRemap, RotationAngleEstimator};
    use cfcache_model::GridCoordinates;

    fn grid() -> GridCoordinates {
        GridCoordinates {
            shape: [256, 512],
            increment_rad: [1.0e-5, 2.0e-5],
            reference_pixel: [128.0, 256.0],
            reference_value_rad: [0.0, 0.0],
            reference_frequency_hz: 1.4e9,
        }
    }

    #[test]
    fn uv_increment_scales_with_grid_and_sampling() {
        let desc = OversampledUvRemap
            .remap_to_fourier_domain(&grid(), [17, 17], kernel_centre([17, 17]), 4.0)
            .expect("remap");
        assert_eq!(desc.reference_pixel, [8.0, 8.0]);
        assert_eq!(desc.reference_value, [0.0, 0.0]);
        assert!((desc.increment[0] - 1.0 / (256.0 * 1.0e-5) / 4.0).abs() < 1e-9);
        assert!((desc.increment[1] - 1.0 / (512.0 * 2.0e-5) / 4.0).abs() < 1e-9);
        assert_eq!(desc.reference_frequency_hz, 1.4e9);
    }

    #[test]
    fn remap_rejects_degenerate_sampling() {
        assert!(OversampledUvRemap
            .remap_to_fourier_domain(&grid(), [9, 9], [4.0, 4.0], 0.0)
            .is_err());
    }

    #[test]
    fn closures_serve_as_estimators() {
        let parallactic = |feed_pa: &f64| feed_pa + std::f64::consts::FRAC_PI_2;
        assert_eq!(parallactic.angle_for(&0.0), std::f64::consts::FRAC_PI_2);
    }
}
