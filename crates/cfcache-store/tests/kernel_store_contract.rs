// SPDX-License-Identifier: Apache-2.0

use cfcache_model::{
    AggregateImage, CacheEntryId, Complex32, CoordinateDescriptor, KernelPlane,
};
use cfcache_store::{PersistentKernelStore, StoreErrorCode};
use std::fs;
use tempfile::tempdir;

fn coords(freq: f64) -> CoordinateDescriptor {
    CoordinateDescriptor {
        origin: [0, 0],
        reference_pixel: [2.0, 2.0],
        reference_value: [0.0, 0.0],
        increment: [12.5, 12.5],
        reference_frequency_hz: freq,
    }
}

fn plane(seed: f32, extent: usize) -> KernelPlane {
    let n = extent * extent;
    let pol = |offset: f32| -> Vec<Complex32> {
        (0..n)
            .map(|i| Complex32::new(seed + i as f32 * 0.125, offset - i as f32 / 7.0))
            .collect()
    };
    KernelPlane::new([extent, extent], vec![pol(0.0), pol(1.0)]).expect("plane")
}

#[test]
fn stored_planes_load_back_identically() {
    let tmp = tempdir().expect("tmp");
    let store = PersistentKernelStore::with_defaults(tmp.path()).expect("store");
    let id = CacheEntryId::new(3);
    let planes = [plane(0.5, 5), plane(-1.0, 7)];
    for (i, p) in planes.iter().enumerate() {
        store.store(id, i, p, &coords(1.4e9)).expect("store plane");
    }
    assert!(tmp.path().join("CF0_3").is_file());
    assert!(tmp.path().join("CF1_3").is_file());
    assert!(store.entry_complete(id, 2));

    let set = store.load(id, 2).expect("load");
    assert_eq!(set.planes(), &planes);
    assert_eq!(set.polarization_count(), 2);
    assert_eq!(set.coordinates(), &coords(1.4e9));
    assert_eq!(set.reference_frequency_hz(), 1.4e9);
}

#[test]
fn missing_plane_is_an_incomplete_entry() {
    let tmp = tempdir().expect("tmp");
    let store = PersistentKernelStore::with_defaults(tmp.path()).expect("store");
    let id = CacheEntryId::new(0);
    store.store(id, 0, &plane(0.0, 3), &coords(1.0e9)).expect("plane 0");

    assert!(!store.entry_complete(id, 2));
    assert!(store.plane_exists(0, id));
    assert!(!store.plane_exists(1, id));
    let err = store.load(id, 2).expect_err("missing plane 1");
    assert_eq!(err.code, StoreErrorCode::IncompleteEntry);
    assert_eq!(err.path.as_deref(), Some(store.plane_path(1, id).as_path()));
}

#[test]
fn damaged_plane_is_a_corrupt_payload() {
    let tmp = tempdir().expect("tmp");
    let store = PersistentKernelStore::with_defaults(tmp.path()).expect("store");
    let id = CacheEntryId::new(0);
    store.store(id, 0, &plane(0.0, 3), &coords(1.0e9)).expect("plane 0");
    fs::write(store.plane_path(0, id), b"{\"format\":").expect("truncate");
    let err = store.load(id, 1).expect_err("corrupt");
    assert_eq!(err.code, StoreErrorCode::CorruptPayload);
}

#[test]
fn listing_ignores_non_plane_files() {
    let tmp = tempdir().expect("tmp");
    let store = PersistentKernelStore::with_defaults(tmp.path()).expect("store");
    store
        .store(CacheEntryId::new(1), 0, &plane(0.0, 3), &coords(1.0e9))
        .expect("1/0");
    store
        .store(CacheEntryId::new(0), 1, &plane(0.0, 3), &coords(1.0e9))
        .expect("0/1");
    fs::write(tmp.path().join("aux.dat"), b"").expect("aux");
    fs::write(tmp.path().join("notes.txt"), b"").expect("notes");
    assert_eq!(
        store.list_plane_files().expect("list"),
        vec![(1, CacheEntryId::new(0)), (0, CacheEntryId::new(1))]
    );
}

#[test]
fn aggregate_is_absent_until_stored() {
    let tmp = tempdir().expect("tmp");
    let store = PersistentKernelStore::with_defaults(tmp.path()).expect("store");
    assert!(store.load_aggregate().expect("absent aggregate").is_none());
    assert!(!store.aggregate_exists());

    let image = AggregateImage::new(vec![2, 3], vec![0.0, 0.5, 1.0, 1.0, 0.5, 0.0], coords(1.4e9))
        .expect("image");
    store.store_aggregate(&image).expect("store");
    assert!(tmp.path().join("avgPB").is_file());
    assert_eq!(store.load_aggregate().expect("load"), Some(image));
}
