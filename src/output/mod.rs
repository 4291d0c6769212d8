//! Per-step output: extraction, snapshots and the export writer.

pub mod context;
pub mod executor;
pub mod module;
pub mod snapshot;
pub mod writer;

pub use context::{ElementContext, IntensiveQuantities, SimulatorView};
pub use executor::{InlineExecutor, TaskExecutor, WorkerExecutor};
pub use module::{OutputModule, StandardOutputModule};
pub use snapshot::{StepSnapshot, WriteStepJob};
pub use writer::{ExportWriter, GlobalTopology, Role, StepInput};
