//! Static connectivity metadata for the initial-state record.
//!
//! Walks every interior connection of the [`GlobalGrid`] exactly once (lower
//! active cell first) and sorts it by the delta of its cartesian indices:
//!
//! | delta      | destination                    |
//! |------------|--------------------------------|
//! | `1`        | `TRANX[min(cart1, cart2)]`     |
//! | `nx`       | `TRANY[min(cart1, cart2)]`     |
//! | `nx·ny`    | `TRANZ[min(cart1, cart2)]`     |
//! | otherwise  | appended to the NNC set        |
//!
//! Directional arrays span the full cartesian box and stay zero where no
//! axis connection exists.

use crate::algs::transmissibility::Transmissibility;
use crate::data::field::{CellData, FieldTable, Measure, TargetType};
use crate::data::nnc::NncSet;
use crate::export_error::ExportError;
use crate::topology::cartesian::Axis;
use crate::topology::grid::GlobalGrid;

/// One transmissibility array per principal axis, indexed by cartesian id.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalTrans {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl DirectionalTrans {
    pub fn zeros(global_size: usize) -> Self {
        Self {
            x: vec![0.0; global_size],
            y: vec![0.0; global_size],
            z: vec![0.0; global_size],
        }
    }

    pub fn axis(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut Vec<f64> {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// `TRANX`/`TRANY`/`TRANZ` as initial-state fields.
    pub fn into_field_table(self) -> FieldTable {
        let mut table = FieldTable::new();
        for (axis, data) in [(Axis::X, self.x), (Axis::Y, self.y), (Axis::Z, self.z)] {
            table.insert(
                axis.trans_keyword().to_owned(),
                CellData::new(Measure::Transmissibility, data, TargetType::Init),
            );
        }
        table
    }
}

/// Everything the initial-state record needs from the topology.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticTopology {
    pub trans: DirectionalTrans,
    pub nnc: NncSet,
}

/// Classify every connection once and hand it to `visit`.
fn visit_connections<F>(grid: &GlobalGrid, mut visit: F) -> Result<(), ExportError>
where
    F: FnMut(usize, usize, usize, usize, Option<Axis>),
{
    let dims = grid.dims();
    for (c1, c2) in grid.connections() {
        let cart1 = grid.cartesian_index(c1);
        let cart2 = grid.cartesian_index(c2);
        let axis = dims.classify(cart1, cart2)?;
        visit(c1, c2, cart1, cart2, axis);
    }
    Ok(())
}

/// Directional transmissibility arrays over the full cartesian box.
pub fn compute_directional_trans(
    grid: &GlobalGrid,
    trans: &dyn Transmissibility,
) -> Result<DirectionalTrans, ExportError> {
    let mut out = DirectionalTrans::zeros(grid.dims().global_size());
    visit_connections(grid, |c1, c2, cart1, cart2, axis| {
        if let Some(axis) = axis {
            out.axis_mut(axis)[cart1.min(cart2)] = trans.transmissibility(c1, c2);
        }
    })?;
    Ok(out)
}

/// Deck NNCs followed by every connection that is not an axis neighbour.
pub fn export_nnc_structure(
    grid: &GlobalGrid,
    trans: &dyn Transmissibility,
    declared: &NncSet,
) -> Result<NncSet, ExportError> {
    let mut nnc = declared.clone();
    visit_connections(grid, |c1, c2, cart1, cart2, axis| {
        if axis.is_none() {
            nnc.add(cart1, cart2, trans.transmissibility(c1, c2));
        }
    })?;
    Ok(nnc)
}

/// Both products of the topology walk in a single pass.
pub fn extract_static_topology(
    grid: &GlobalGrid,
    trans: &dyn Transmissibility,
    declared: &NncSet,
) -> Result<StaticTopology, ExportError> {
    let mut tran = DirectionalTrans::zeros(grid.dims().global_size());
    let mut nnc = declared.clone();
    visit_connections(grid, |c1, c2, cart1, cart2, axis| {
        let t = trans.transmissibility(c1, c2);
        match axis {
            Some(axis) => tran.axis_mut(axis)[cart1.min(cart2)] = t,
            None => nnc.add(cart1, cart2, t),
        }
    })?;
    log::debug!(
        "static topology: {} cells, {} NNCs ({} declared)",
        grid.num_cells(),
        nnc.len(),
        declared.len()
    );
    Ok(StaticTopology { trans: tran, nnc })
}
