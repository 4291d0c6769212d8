//! Structured-grid topology: cartesian numbering and the global grid view.

pub mod cartesian;
pub mod grid;

pub use cartesian::{Axis, CartesianDims};
pub use grid::{GlobalGrid, GlobalGridBuilder};
