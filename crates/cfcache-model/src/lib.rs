// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]
//! Convolution-function cache model.
//!
//! Every structure keyed by [`CacheEntryId`] (rotation angles, support
//! columns, sampling factors, kernel payloads) is defined here so the store and
//! controller crates share one notion of index alignment.

mod coords;
mod error;
mod ids;
mod image;
mod index;
mod kernel;
mod support;

pub use coords::{CoordinateDescriptor, GridCoordinates};
pub use error::ValidationError;
pub use ids::CacheEntryId;
pub use image::{AggregateImage, ImageRecord, Pixels};
pub use index::{AuxIndex, IndexEntry};
pub use kernel::{ComputedKernel, KernelPlane, KernelPlaneSet};
pub use num_complex::Complex32;
pub use support::{Support, SupportTable};

pub const CRATE_NAME: &str = "cfcache-model";
