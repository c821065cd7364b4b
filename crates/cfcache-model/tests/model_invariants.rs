// SPDX-License-Identifier: Apache-2.0

use cfcache_model::{AuxIndex, CacheEntryId, Support, SupportTable};

fn supports(values: &[(u32, u32)]) -> Vec<Support> {
    values
        .iter()
        .map(|(x, y)| Support::new(*x, *y).expect("support"))
        .collect()
}

fn two_entry_index() -> AuxIndex {
    let mut index = AuxIndex::empty();
    index
        .append(12.5_f64.to_radians(), supports(&[(7, 7), (9, 9)]), 4.0)
        .expect("entry 0");
    index
        .append(47.0_f64.to_radians(), supports(&[(7, 7), (9, 9)]), 4.0)
        .expect("entry 1");
    index
}

#[test]
fn every_committed_id_is_defined_in_all_structures() {
    let index = two_entry_index();
    for i in 0..index.entry_count() {
        let id = CacheEntryId::from_index(i).expect("id");
        let column = index.supports().column(id).expect("support column");
        assert_eq!(column.len(), index.plane_count());
        assert!(index.angles().get(i).is_some());
        assert!(index.sampling().get(i).is_some());
    }
    assert!(index.entry(CacheEntryId::new(2)).is_none());
}

#[test]
fn truncating_any_single_structure_is_detected() {
    let index = two_entry_index();
    let angles = index.angles().to_vec();
    let sampling = index.sampling().to_vec();
    let table = index.supports().clone();

    let mut short_angles = angles.clone();
    short_angles.pop();
    assert!(AuxIndex::from_parts(short_angles, table.clone(), sampling.clone()).is_err());

    let mut short_sampling = sampling.clone();
    short_sampling.pop();
    assert!(AuxIndex::from_parts(angles.clone(), table.clone(), short_sampling).is_err());

    let mut short_table = table.clone();
    short_table.truncate(1);
    assert!(AuxIndex::from_parts(angles.clone(), short_table, sampling.clone()).is_err());

    let rebuilt = AuxIndex::from_parts(angles, table, sampling).expect("aligned parts");
    assert_eq!(rebuilt, index);
}

#[test]
fn truncate_keeps_structures_aligned() {
    let mut index = two_entry_index();
    index.truncate(1);
    assert_eq!(index.entry_count(), 1);
    assert!(index.validate_alignment().is_ok());
    assert_eq!(index.next_id().expect("next id"), CacheEntryId::new(1));
}

#[test]
fn support_rows_follow_entry_order() {
    let table = SupportTable::from_columns(vec![
        supports(&[(3, 3), (5, 5)]),
        supports(&[(4, 4), (6, 6)]),
    ])
    .expect("table");
    assert_eq!(table.row(1), supports(&[(5, 5), (6, 6)]));
    assert!(SupportTable::from_columns(vec![supports(&[(3, 3)]), supports(&[(3, 3), (4, 4)])])
        .is_err());
}
