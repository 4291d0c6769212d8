//! Re-export public algorithms.

pub mod collect;
pub mod communicator;
pub mod extract;
pub mod gather;
pub mod transmissibility;
pub mod wire;

pub use collect::{CollectToIoRank, DataCollector, IO_RANK};
pub use extract::{compute_directional_trans, export_nnc_structure, extract_static_topology};
