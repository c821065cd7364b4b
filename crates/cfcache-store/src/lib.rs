// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

//! Persistent tier of the kernel cache: the `aux.dat` index and one image
//! file per kernel plane under a single storage root.

mod codec;
mod error;
mod fs_io;
mod kernels;
mod metadata;
pub mod paths;

pub use codec::{ImageCodec, JsonImageCodec, IMAGE_FORMAT, IMAGE_FORMAT_VERSION};
pub use error::{StoreError, StoreErrorCode};
pub use fs_io::{acquire_writer_lock, ensure_storage_root, write_atomic_file, WriterLockGuard};
pub use kernels::PersistentKernelStore;
pub use metadata::{
    decode_aux, encode_aux, MetadataStore, PlaneFileRef, ReconcileReport, AUX_FORMAT,
    AUX_FORMAT_VERSION,
};

pub const CRATE_NAME: &str = "cfcache-store";
