//! Persistence of initial-state and time-step records.
//!
//! The export writer only talks to [`PersistenceBackend`]. [`memory`] keeps
//! records in process; [`json`] (feature `file-output`) writes a case
//! directory.

#[cfg(feature = "file-output")]
pub mod json;
pub mod memory;

use crate::data::field::{FieldTable, round_to_single};
use crate::data::nnc::NncSet;
use crate::data::restart::{ExtraKeys, RestartCatalog, RestartValues};
use crate::export_error::ExportError;
use crate::output::snapshot::StepSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static data of a run: directional transmissibilities, diagnostic
/// integer arrays and the NNC list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub fields: FieldTable,
    pub integer_vectors: BTreeMap<String, Vec<i32>>,
    pub nnc: NncSet,
}

/// Storage for output records.
///
/// Shared between the export writer and its background write jobs, so all
/// methods take `&self`.
pub trait PersistenceBackend: Send + Sync {
    fn write_initial_state(&self, state: &InitialState) -> Result<(), ExportError>;

    fn write_time_step(&self, snapshot: &StepSnapshot) -> Result<(), ExportError>;

    /// Load the restart record of `episode`, restricted to `catalog` and
    /// `extra`. Solution arrays are indexed by global cell.
    fn load_restart(
        &self,
        episode: usize,
        catalog: &RestartCatalog,
        extra: &ExtraKeys,
    ) -> Result<RestartValues, ExportError>;
}

/// The cell data of `snapshot` as a backend stores it.
pub(crate) fn stored_cell_data(snapshot: &StepSnapshot) -> FieldTable {
    let mut cells = snapshot.cell_data.clone();
    if !snapshot.double_precision {
        round_to_single(&mut cells);
    }
    cells
}

/// Restart selection over a stored record.
pub(crate) fn select_restart(
    record: &StepSnapshot,
    catalog: &RestartCatalog,
    extra: &ExtraKeys,
) -> Result<RestartValues, ExportError> {
    Ok(RestartValues {
        solution: catalog.select(&record.cell_data)?,
        extra: extra.select(&record.extra_restart)?,
    })
}
