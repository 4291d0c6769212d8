//! In-process record store.

use crate::data::restart::{ExtraKeys, RestartCatalog, RestartValues};
use crate::export_error::ExportError;
use crate::io::{InitialState, PersistenceBackend, select_restart, stored_cell_data};
use crate::output::snapshot::StepSnapshot;
use parking_lot::RwLock;

/// Keeps the initial state and every step record, in write order.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    initial: RwLock<Option<InitialState>>,
    steps: RwLock<Vec<StepSnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_state(&self) -> Option<InitialState> {
        self.initial.read().clone()
    }

    /// All step records written so far, oldest first.
    pub fn steps(&self) -> Vec<StepSnapshot> {
        self.steps.read().clone()
    }

    pub fn episodes(&self) -> Vec<usize> {
        self.steps.read().iter().map(|s| s.episode_index).collect()
    }

    /// Seed a record, e.g. to restart from data produced elsewhere.
    pub fn insert_step(&self, snapshot: StepSnapshot) {
        self.steps.write().push(snapshot);
    }
}

impl PersistenceBackend for MemoryBackend {
    fn write_initial_state(&self, state: &InitialState) -> Result<(), ExportError> {
        *self.initial.write() = Some(state.clone());
        Ok(())
    }

    fn write_time_step(&self, snapshot: &StepSnapshot) -> Result<(), ExportError> {
        let stored = StepSnapshot {
            cell_data: stored_cell_data(snapshot),
            ..snapshot.clone()
        };
        self.steps.write().push(stored);
        Ok(())
    }

    fn load_restart(
        &self,
        episode: usize,
        catalog: &RestartCatalog,
        extra: &ExtraKeys,
    ) -> Result<RestartValues, ExportError> {
        let steps = self.steps.read();
        let record = steps
            .iter()
            .rev()
            .find(|s| s.episode_index == episode && !s.is_substep)
            .ok_or(ExportError::RestartRecordNotFound(episode))?;
        select_restart(record, catalog, extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::{CellData, Measure, TargetType};
    use crate::data::restart::PhysicalConfig;

    #[test]
    fn single_precision_rounds_cells() {
        let backend = MemoryBackend::new();
        let mut snap = StepSnapshot {
            episode_index: 1,
            ..StepSnapshot::default()
        };
        snap.cell_data.insert(
            "PRESSURE".into(),
            CellData::new(Measure::Pressure, vec![0.1], TargetType::RestartSolution),
        );
        backend.write_time_step(&snap).unwrap();
        assert_eq!(backend.steps()[0].cell_data["PRESSURE"].data[0], 0.1f32 as f64);
    }

    #[test]
    fn restart_of_unknown_episode_fails() {
        let backend = MemoryBackend::new();
        let cat = RestartCatalog::for_physics(&PhysicalConfig::default());
        assert_eq!(
            backend.load_restart(2, &cat, &ExtraKeys::standard()),
            Err(ExportError::RestartRecordNotFound(2))
        );
    }
}
