//! Cartesian index arithmetic for structured reservoir grids.
//!
//! A cell `(i, j, k)` of an `nx × ny × nz` box has the linear id
//! `i + j·nx + k·nx·ny`. Two cells are axis neighbours when their linear ids
//! differ by exactly one stride: `1` (X), `nx` (Y) or `nx·ny` (Z).

use crate::export_error::ExportError;
use serde::{Deserialize, Serialize};

/// Principal axis of a structured connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Name of the transmissibility field stored for this axis.
    pub const fn trans_keyword(self) -> &'static str {
        match self {
            Axis::X => "TRANX",
            Axis::Y => "TRANY",
            Axis::Z => "TRANZ",
        }
    }
}

/// Logical dimensions of the cartesian box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartesianDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl CartesianDims {
    /// Dimensions with every extent non-zero.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self, ExportError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ExportError::InvalidGrid(format!(
                "cartesian dimensions must be non-zero, got {nx}x{ny}x{nz}"
            )));
        }
        Ok(Self { nx, ny, nz })
    }

    /// Total number of cartesian cells, active or not.
    #[inline]
    pub const fn global_size(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        i + j * self.nx + k * self.nx * self.ny
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    pub fn ijk(&self, linear: usize) -> Result<[usize; 3], ExportError> {
        self.check(linear)?;
        let layer = self.nx * self.ny;
        let k = linear / layer;
        let rem = linear % layer;
        Ok([rem % self.nx, rem / self.nx, k])
    }

    /// Stride between axis neighbours along `axis`.
    #[inline]
    pub const fn stride(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => 1,
            Axis::Y => self.nx,
            Axis::Z => self.nx * self.ny,
        }
    }

    pub fn check(&self, linear: usize) -> Result<(), ExportError> {
        if linear < self.global_size() {
            Ok(())
        } else {
            Err(ExportError::CellOutOfRange {
                cell: linear,
                size: self.global_size(),
            })
        }
    }

    /// Classify the connection between two cartesian cells by index delta.
    ///
    /// Returns `Ok(None)` when the delta matches no stride (a non-neighbour
    /// connection) and an error when it matches several, which happens for
    /// degenerate boxes such as `nx == 1`.
    pub fn classify(&self, cart1: usize, cart2: usize) -> Result<Option<Axis>, ExportError> {
        let delta = cart1.abs_diff(cart2);
        let mut hit = None;
        for axis in Axis::ALL {
            if delta == self.stride(axis) {
                if hit.is_some() {
                    return Err(ExportError::AmbiguousConnection {
                        cell1: cart1.min(cart2),
                        cell2: cart1.max(cart2),
                        delta,
                    });
                }
                hit = Some(axis);
            }
        }
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_and_ijk_agree() {
        let dims = CartesianDims::new(4, 3, 2).unwrap();
        let idx = dims.linear_index(3, 2, 1);
        assert_eq!(idx, 3 + 2 * 4 + 12);
        assert_eq!(dims.ijk(idx).unwrap(), [3, 2, 1]);
        assert!(dims.ijk(dims.global_size()).is_err());
    }

    #[test]
    fn classify_by_stride() {
        let dims = CartesianDims::new(4, 4, 2).unwrap();
        assert_eq!(dims.classify(5, 6).unwrap(), Some(Axis::X));
        assert_eq!(dims.classify(9, 5).unwrap(), Some(Axis::Y));
        assert_eq!(dims.classify(3, 19).unwrap(), Some(Axis::Z));
        assert_eq!(dims.classify(0, 10).unwrap(), None);
    }

    #[test]
    fn degenerate_box_is_ambiguous() {
        let dims = CartesianDims::new(1, 3, 1).unwrap();
        let err = dims.classify(0, 1).unwrap_err();
        assert!(matches!(err, ExportError::AmbiguousConnection { delta: 1, .. }));
    }

    #[test]
    fn zero_extent_rejected() {
        assert!(CartesianDims::new(0, 1, 1).is_err());
    }
}
