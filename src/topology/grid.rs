//! Immutable global (non-distributed) view of the reservoir grid.
//!
//! The runtime mesh is split across ranks; static output metadata needs every
//! cell at once. [`GlobalGrid`] is built once, before the first output, and is
//! never mutated afterwards. Cells are the *active* cells, numbered `0..n`,
//! each carrying its cartesian index. Face adjacency is stored CSR-style:
//!
//! * `face_offsets[c] .. face_offsets[c + 1]` = faces of cell `c`
//! * `faces[f]` = `Some(neighbour)` for an interior face, `None` on the boundary
//!
//! Neighbour lists are symmetric and free of duplicates, so every connection
//! is reachable from both of its cells exactly once.

use crate::export_error::ExportError;
use crate::topology::cartesian::{Axis, CartesianDims};
use itertools::Itertools;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct GlobalGrid {
    dims: CartesianDims,
    global_cell: Vec<usize>,
    active_of_cart: Vec<Option<usize>>,
    face_offsets: Vec<usize>,
    faces: Vec<Option<usize>>,
}

impl GlobalGrid {
    /// Fully active structured box with axis-neighbour faces only.
    pub fn structured(dims: CartesianDims) -> Result<Self, ExportError> {
        GlobalGridBuilder::new(dims).build()
    }

    /// Build from an explicit per-cell face list.
    ///
    /// `global_cell[c]` is the cartesian index of active cell `c`; `faces[c]`
    /// lists the neighbour across each face of `c` (`None` for boundary
    /// faces). A connection listed from one side only is mirrored onto the
    /// other side; repeated neighbours collapse into one face.
    pub fn from_faces(
        dims: CartesianDims,
        global_cell: Vec<usize>,
        faces: Vec<Vec<Option<usize>>>,
    ) -> Result<Self, ExportError> {
        let n = global_cell.len();
        if faces.len() != n {
            return Err(ExportError::BufferSizeMismatch {
                name: "faces".into(),
                expected: n,
                found: faces.len(),
            });
        }
        let mut active_of_cart = vec![None; dims.global_size()];
        for (cell, &cart) in global_cell.iter().enumerate() {
            dims.check(cart)?;
            if active_of_cart[cart].replace(cell).is_some() {
                return Err(ExportError::InvalidGrid(format!(
                    "cartesian cell {cart} mapped by more than one active cell"
                )));
            }
        }

        let mut boundary = vec![0usize; n];
        let mut nbrs: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (cell, cell_faces) in faces.iter().enumerate() {
            for face in cell_faces {
                match *face {
                    None => boundary[cell] += 1,
                    Some(other) if other == cell => {
                        return Err(ExportError::InvalidGrid(format!(
                            "cell {cell} lists itself as a neighbour"
                        )));
                    }
                    Some(other) if other >= n => {
                        return Err(ExportError::CellOutOfRange {
                            cell: other,
                            size: n,
                        });
                    }
                    Some(other) => {
                        nbrs[cell].insert(other);
                        nbrs[other].insert(cell);
                    }
                }
            }
        }

        let mut face_offsets = Vec::with_capacity(n + 1);
        let mut flat = Vec::new();
        face_offsets.push(0);
        for (cell, set) in nbrs.into_iter().enumerate() {
            flat.extend(set.into_iter().map(Some));
            flat.extend(std::iter::repeat_n(None, boundary[cell]));
            face_offsets.push(flat.len());
        }

        Ok(Self {
            dims,
            global_cell,
            active_of_cart,
            face_offsets,
            faces: flat,
        })
    }

    #[inline]
    pub fn dims(&self) -> CartesianDims {
        self.dims
    }

    /// Number of active cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.global_cell.len()
    }

    /// Cartesian index of active cell `cell`.
    #[inline]
    pub fn cartesian_index(&self, cell: usize) -> usize {
        self.global_cell[cell]
    }

    pub fn global_cells(&self) -> &[usize] {
        &self.global_cell
    }

    /// Active cell at a cartesian position, if any.
    pub fn active_cell(&self, cart: usize) -> Option<usize> {
        self.active_of_cart.get(cart).copied().flatten()
    }

    /// All faces of `cell`; `None` marks a boundary face.
    pub fn faces(&self, cell: usize) -> &[Option<usize>] {
        &self.faces[self.face_offsets[cell]..self.face_offsets[cell + 1]]
    }

    /// Every interior connection once, as `(low, high)` active-cell pairs,
    /// in increasing order of `low`.
    pub fn connections(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_cells()).flat_map(move |c1| {
            self.faces(c1)
                .iter()
                .filter_map(move |face| face.filter(|&c2| c1 < c2).map(|c2| (c1, c2)))
        })
    }

    /// Total number of interior connections.
    pub fn num_connections(&self) -> usize {
        self.connections().count()
    }
}

/// Builder for structured grids with an activity mask and extra face
/// connections (fault juxtapositions, pinch-outs).
#[derive(Clone, Debug)]
pub struct GlobalGridBuilder {
    dims: CartesianDims,
    active: Vec<bool>,
    extra: Vec<(usize, usize)>,
}

impl GlobalGridBuilder {
    pub fn new(dims: CartesianDims) -> Self {
        Self {
            dims,
            active: vec![true; dims.global_size()],
            extra: Vec::new(),
        }
    }

    /// Replace the activity mask (ACTNUM); one flag per cartesian cell.
    pub fn with_actnum(mut self, actnum: &[bool]) -> Result<Self, ExportError> {
        if actnum.len() != self.dims.global_size() {
            return Err(ExportError::BufferSizeMismatch {
                name: "ACTNUM".into(),
                expected: self.dims.global_size(),
                found: actnum.len(),
            });
        }
        self.active = actnum.to_vec();
        Ok(self)
    }

    pub fn deactivate(mut self, cart: usize) -> Result<Self, ExportError> {
        self.dims.check(cart)?;
        self.active[cart] = false;
        Ok(self)
    }

    /// Declare a face shared by two cartesian cells beyond the regular
    /// axis neighbours.
    pub fn add_face_connection(mut self, cart1: usize, cart2: usize) -> Result<Self, ExportError> {
        self.dims.check(cart1)?;
        self.dims.check(cart2)?;
        if cart1 == cart2 {
            return Err(ExportError::InvalidGrid(format!(
                "face connection from cell {cart1} to itself"
            )));
        }
        self.extra.push((cart1, cart2));
        Ok(self)
    }

    pub fn build(self) -> Result<GlobalGrid, ExportError> {
        let dims = self.dims;
        let global_cell: Vec<usize> = self.active.iter().positions(|&a| a).collect();
        let mut active_of_cart = vec![None; dims.global_size()];
        for (cell, &cart) in global_cell.iter().enumerate() {
            active_of_cart[cart] = Some(cell);
        }

        let mut faces: Vec<Vec<Option<usize>>> = Vec::with_capacity(global_cell.len());
        for &cart in &global_cell {
            let [i, j, k] = dims.ijk(cart)?;
            let pos = [i, j, k];
            let ext = [dims.nx, dims.ny, dims.nz];
            let mut cell_faces = Vec::with_capacity(6);
            for (d, axis) in Axis::ALL.into_iter().enumerate() {
                let stride = dims.stride(axis);
                let lower = (pos[d] > 0).then(|| cart - stride);
                let upper = (pos[d] + 1 < ext[d]).then(|| cart + stride);
                for nb in [lower, upper] {
                    cell_faces.push(nb.and_then(|c| active_of_cart[c]));
                }
            }
            faces.push(cell_faces);
        }

        for (cart1, cart2) in self.extra {
            let (Some(c1), Some(c2)) = (active_of_cart[cart1], active_of_cart[cart2]) else {
                return Err(ExportError::InvalidGrid(format!(
                    "face connection {cart1}-{cart2} touches an inactive cell"
                )));
            };
            faces[c1].push(Some(c2));
        }

        GlobalGrid::from_faces(dims, global_cell, faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_box_counts() {
        let grid = GlobalGrid::structured(CartesianDims::new(3, 2, 2).unwrap()).unwrap();
        assert_eq!(grid.num_cells(), 12);
        // (nx-1)·ny·nz + nx·(ny-1)·nz + nx·ny·(nz-1)
        assert_eq!(grid.num_connections(), 2 * 2 * 2 + 3 * 2 + 3 * 2);
        assert!(grid.faces(0).iter().all(|f| f.map_or(true, |c| c != 0)));
        assert_eq!(grid.faces(0).len(), 6);
    }

    #[test]
    fn inactive_cells_become_boundary() {
        let dims = CartesianDims::new(3, 1, 1).unwrap();
        let grid = GlobalGridBuilder::new(dims)
            .deactivate(1)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(grid.global_cells(), &[0, 2]);
        assert_eq!(grid.num_connections(), 0);
        assert_eq!(grid.active_cell(2), Some(1));
        assert_eq!(grid.active_cell(1), None);
    }

    #[test]
    fn one_sided_faces_are_mirrored_and_deduplicated() {
        let dims = CartesianDims::new(3, 1, 1).unwrap();
        let grid = GlobalGrid::from_faces(
            dims,
            vec![0, 1, 2],
            vec![vec![Some(1), Some(1)], vec![None], vec![Some(1)]],
        )
        .unwrap();
        let pairs: Vec<_> = grid.connections().collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn extra_connection_to_inactive_cell_rejected() {
        let dims = CartesianDims::new(4, 1, 1).unwrap();
        let err = GlobalGridBuilder::new(dims)
            .deactivate(3)
            .unwrap()
            .add_face_connection(0, 3)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidGrid(_)));
    }
}
