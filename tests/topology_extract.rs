use reservoir_export::algs::extract::{
    compute_directional_trans, export_nnc_structure, extract_static_topology,
};
use reservoir_export::algs::transmissibility::{Transmissibility, TransmissibilityMap};
use reservoir_export::prelude::*;
use std::sync::Arc;

fn box_4x4x1() -> GlobalGrid {
    GlobalGrid::structured(CartesianDims::new(4, 4, 1).unwrap()).unwrap()
}

fn set_indices(values: &[f64]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| (v != 0.0).then_some(i))
        .collect()
}

#[test]
fn four_by_four_with_declared_nnc() {
    let grid = box_4x4x1();
    let mut declared = NncSet::new();
    declared.add(0, 10, 0.75);

    let topo = extract_static_topology(&grid, &UniformTransmissibility(5.0), &declared).unwrap();

    assert_eq!(
        set_indices(&topo.trans.x),
        vec![0, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14]
    );
    assert!(topo.trans.x.iter().all(|&t| t == 0.0 || t == 5.0));
    // Rows 0..=2 connect upwards; the last row has no +y neighbour.
    assert_eq!(set_indices(&topo.trans.y), (0..12).collect::<Vec<_>>());
    assert!(set_indices(&topo.trans.z).is_empty());
    assert_eq!(topo.nnc.len(), 1);
    let nnc = topo.nnc.entries()[0];
    assert_eq!((nnc.cell1, nnc.cell2, nnc.trans), (0, 10, 0.75));
}

#[test]
fn single_pass_matches_separate_passes() {
    let dims = CartesianDims::new(3, 3, 2).unwrap();
    let grid = GlobalGridBuilder::new(dims)
        .add_face_connection(0, 8)
        .unwrap()
        .add_face_connection(4, 17)
        .unwrap()
        .build()
        .unwrap();
    let trans = |c1: usize, c2: usize| (c1 * 100 + c2) as f64;
    let mut declared = NncSet::new();
    declared.add(2, 6, 1.0);

    let both = extract_static_topology(&grid, &trans, &declared).unwrap();
    assert_eq!(both.trans, compute_directional_trans(&grid, &trans).unwrap());
    assert_eq!(
        both.nnc,
        export_nnc_structure(&grid, &trans, &declared).unwrap()
    );
    // Declared first, then discovered in visiting order.
    let pairs: Vec<_> = both.nnc.iter().map(|e| (e.cell1, e.cell2)).collect();
    assert_eq!(pairs, vec![(2, 6), (0, 8), (4, 17)]);
}

#[test]
fn zero_transmissibility_is_stored() {
    let grid = box_4x4x1();
    let mut map = TransmissibilityMap::new();
    map.insert(0, 1, 0.0);
    let tran = compute_directional_trans(&grid, &map).unwrap();
    assert_eq!(tran.x.len(), 16);
    assert_eq!(tran.x[0], 0.0);
}

#[test]
fn inactive_cells_use_cartesian_positions() {
    let dims = CartesianDims::new(3, 2, 1).unwrap();
    let grid = GlobalGridBuilder::new(dims).deactivate(1).unwrap().build().unwrap();
    // Active cell 1 is cartesian 2; cell 0 (cart 0) and cell 1 are not neighbours.
    let tran = compute_directional_trans(&grid, &UniformTransmissibility(2.0)).unwrap();
    assert_eq!(tran.x, vec![0.0, 0.0, 0.0, 2.0, 2.0, 0.0]);
    assert_eq!(tran.y, vec![2.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
}

#[test]
fn degenerate_box_is_ambiguous() {
    let grid = GlobalGrid::structured(CartesianDims::new(1, 3, 2).unwrap()).unwrap();
    let err = compute_directional_trans(&grid, &UniformTransmissibility(1.0)).unwrap_err();
    assert!(matches!(err, ExportError::AmbiguousConnection { delta: 1, .. }));
}

#[test]
fn distributed_run_needs_global_transmissibilities() {
    let seq: Arc<dyn Transmissibility> = Arc::new(UniformTransmissibility(1.0));
    let source = TransmissibilitySource::sequential(seq.clone());
    assert_eq!(
        source.select(true).err(),
        Some(ExportError::MissingGlobalTransmissibility)
    );

    let global: Arc<dyn Transmissibility> = Arc::new(UniformTransmissibility(9.0));
    let source = TransmissibilitySource::new(seq, Some(global));
    assert_eq!(source.select(false).unwrap().transmissibility(0, 1), 1.0);
    assert_eq!(source.select(true).unwrap().transmissibility(0, 1), 9.0);
}
