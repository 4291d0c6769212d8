//! Data module: field tables, well and block results, NNCs and restart keys.

pub mod block;
pub mod field;
pub mod nnc;
pub mod restart;
pub mod wells;

pub use block::BlockData;
pub use field::{CellData, FieldTable, Measure, TargetType};
pub use nnc::{NncEntry, NncSet};
pub use restart::{ExtraKeys, PhysicalConfig, RestartCatalog, RestartValues};
pub use wells::{Well, WellConnection, WellData};
