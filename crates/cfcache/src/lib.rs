// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

//! Two-tier cache for gridding convolution kernels keyed by sky-rotation
//! angle: a lazily promoted memory tier over the persistent store in
//! `cfcache-store`.

pub mod collaborators;
mod config;
mod controller;
mod error;
pub mod matching;
mod memory;

pub use collaborators::{FourierRemap, KernelSource, OversampledUvRemap, RotationAngleEstimator};
pub use config::{CacheConfig, DEFAULT_TOLERANCE_DEG};
pub use controller::{
    AngleBucket, CacheHit, CacheLookup, CacheStats, CommitRequest, EntryState, HitSource,
    KernelCache,
};
pub use error::{CacheError, CacheErrorCode};
pub use matching::MatchOutcome;
pub use memory::MemoryTier;

pub use cfcache_store::ReconcileReport;

pub const CRATE_NAME: &str = "cfcache";
