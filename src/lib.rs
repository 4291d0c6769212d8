#![cfg_attr(docsrs, feature(doc_cfg))]
//! # reservoir-export
//!
//! reservoir-export is the result-output layer of a parallel reservoir
//! simulator. It turns the solver's distributed cell state into persisted
//! records: a static initial-state record (directional transmissibilities
//! and non-neighbour connections) and one record per report step, gathered
//! onto a single I/O rank and written in the background.
//!
//! ## Features
//! - Topology extraction from an immutable global grid view (`TRANX`,
//!   `TRANY`, `TRANZ` and NNCs)
//! - Pluggable communication backends (serial, in-process threads, MPI) for
//!   collecting rank-local buffers on the I/O rank
//! - Asynchronous step writes with at most one job in flight
//! - Restart loading filtered by the active physics
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! reservoir-export = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! The default `file-output` feature provides the JSON case-directory
//! backend. Without it a [`PersistenceBackend`](io::PersistenceBackend)
//! must be supplied, or every write fails with
//! [`ExportError::BackendUnavailable`](export_error::ExportError).

pub mod algs;
pub mod config;
pub mod data;
pub mod export_error;
pub mod io;
pub mod output;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::collect::{CollectToIoRank, DataCollector};
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::transmissibility::{
        Transmissibility, TransmissibilityMap, TransmissibilitySource, UniformTransmissibility,
    };
    pub use crate::config::ExportConfig;
    pub use crate::data::{
        BlockData, CellData, FieldTable, Measure, NncSet, PhysicalConfig, TargetType, WellData,
    };
    pub use crate::export_error::ExportError;
    pub use crate::io::PersistenceBackend;
    pub use crate::io::memory::MemoryBackend;
    pub use crate::output::{
        ElementContext, ExportWriter, GlobalTopology, IntensiveQuantities, OutputModule, Role,
        SimulatorView, StandardOutputModule, StepInput,
    };
    pub use crate::topology::{CartesianDims, GlobalGrid, GlobalGridBuilder};
}
