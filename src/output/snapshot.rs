//! The immutable per-step bundle handed to a write job.

use crate::data::block::BlockData;
use crate::data::field::FieldTable;
use crate::data::wells::WellData;
use crate::export_error::ExportError;
use crate::io::PersistenceBackend;
use crate::output::executor::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything one time-step record contains.
///
/// A snapshot owns deep copies of its buffers; nothing in it aliases the
/// buffers the next step is being extracted into.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub episode_index: usize,
    pub is_substep: bool,
    pub seconds_elapsed: f64,
    pub cell_data: FieldTable,
    pub well_data: WellData,
    pub scalar_summary: BTreeMap<String, f64>,
    pub region_summary: BTreeMap<String, Vec<f64>>,
    pub block_summary: BlockData,
    pub extra_restart: BTreeMap<String, Vec<f64>>,
    pub double_precision: bool,
}

impl StepSnapshot {
    /// Approximate payload size, for logging.
    pub fn num_values(&self) -> usize {
        self.cell_data.values().map(|c| c.len()).sum::<usize>()
            + self.region_summary.values().map(Vec::len).sum::<usize>()
            + self.scalar_summary.len()
            + self.block_summary.len()
    }
}

/// Write one snapshot through a backend. Its only effect is that write.
pub struct WriteStepJob {
    backend: Arc<dyn PersistenceBackend>,
    snapshot: StepSnapshot,
}

impl WriteStepJob {
    pub fn new(backend: Arc<dyn PersistenceBackend>, snapshot: StepSnapshot) -> Self {
        Self { backend, snapshot }
    }

    pub fn snapshot(&self) -> &StepSnapshot {
        &self.snapshot
    }
}

impl Task for WriteStepJob {
    fn run(self: Box<Self>) -> Result<(), ExportError> {
        log::debug!(
            "writing episode {} ({} values{})",
            self.snapshot.episode_index,
            self.snapshot.num_values(),
            if self.snapshot.is_substep { ", substep" } else { "" }
        );
        self.backend
            .write_time_step(&self.snapshot)
            .map_err(|e| ExportError::WriteFailed {
                episode: self.snapshot.episode_index,
                reason: e.to_string(),
            })
    }
}
