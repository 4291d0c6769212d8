//! The export writer: per-step extraction, collection onto the I/O rank and
//! hand-off to the persistence backend.
//!
//! Every rank owns an [`ExportWriter`]. Its [`Role`] is fixed at
//! construction: compute ranks only extract and take part in collection,
//! the I/O rank additionally holds the global topology and the task
//! executor and builds the records.
//!
//! On the I/O rank a step record is deep-copied into a [`StepSnapshot`]
//! before the previous write job is drained, and at most one job is ever
//! outstanding, so slow storage throttles the run by one step at most.

use crate::algs::collect::DataCollector;
use crate::algs::extract::extract_static_topology;
use crate::algs::transmissibility::TransmissibilitySource;
use crate::config::ExportConfig;
use crate::data::field::FieldTable;
use crate::data::nnc::NncSet;
use crate::data::restart::{ExtraKeys, RestartCatalog, RestartValues};
use crate::data::wells::WellData;
use crate::export_error::ExportError;
use crate::io::{InitialState, PersistenceBackend};
use crate::output::context::{ElementContext, SimulatorView};
use crate::output::executor::{InlineExecutor, TaskExecutor, WorkerExecutor};
use crate::output::module::OutputModule;
use crate::output::snapshot::{StepSnapshot, WriteStepJob};
use crate::topology::grid::GlobalGrid;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Summary key of the cumulative solver time.
pub const SOLVER_TIME_KEY: &str = "TCPU";
/// Integer vector with the owning rank of every global cell.
pub const RANK_VECTOR_KEY: &str = "MPI_RANK";

/// Which part of the output protocol a rank plays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Compute,
    IoRank,
}

/// Read-only view of the whole grid, built once before the run.
#[derive(Clone, Debug)]
pub struct GlobalTopology {
    pub grid: GlobalGrid,
    pub trans: TransmissibilitySource,
    /// NNCs declared by the input deck.
    pub declared_nnc: NncSet,
}

impl GlobalTopology {
    pub fn new(grid: GlobalGrid, trans: TransmissibilitySource) -> Self {
        Self {
            grid,
            trans,
            declared_nnc: NncSet::new(),
        }
    }

    pub fn with_declared_nnc(mut self, nnc: NncSet) -> Self {
        self.declared_nnc = nnc;
        self
    }
}

struct IoRankState {
    topology: GlobalTopology,
    executor: Box<dyn TaskExecutor>,
}

enum RoleState {
    Compute,
    IoRank(IoRankState),
}

/// Per-step inputs that do not come from the simulator's cell state.
#[derive(Clone, Debug, Default)]
pub struct StepInput<'a> {
    pub wells: Option<&'a WellData>,
    pub seconds_elapsed: f64,
    pub is_substep: bool,
    pub total_solver_time: f64,
    pub next_step_size: f64,
}

/// Output orchestrator of one rank.
pub struct ExportWriter<M: OutputModule, D: DataCollector> {
    config: ExportConfig,
    collector: D,
    module: M,
    backend: Option<Arc<dyn PersistenceBackend>>,
    role: RoleState,
}

fn default_backend(
    config: &ExportConfig,
) -> Result<Option<Arc<dyn PersistenceBackend>>, ExportError> {
    #[cfg(feature = "file-output")]
    {
        let backend = crate::io::json::JsonDirBackend::create(
            config.output_dir.clone(),
            config.case_name.clone(),
        )?;
        Ok(Some(Arc::new(backend)))
    }
    #[cfg(not(feature = "file-output"))]
    {
        let _ = config;
        Ok(None)
    }
}

impl<M: OutputModule, D: DataCollector> ExportWriter<M, D> {
    /// Set up the writer for this rank.
    ///
    /// `backend` overrides the built-in file backend. The global topology is
    /// only kept on the I/O rank; the background writer thread is only
    /// started there, and only with `enable_async_output`.
    pub fn initialize(
        config: ExportConfig,
        collector: D,
        module: M,
        topology: GlobalTopology,
        backend: Option<Arc<dyn PersistenceBackend>>,
    ) -> Result<Self, ExportError> {
        let backend = match backend {
            Some(b) => Some(b),
            None => default_backend(&config)?,
        };
        let role = if collector.is_io_rank() {
            if topology.grid.num_cells() != collector.num_global_cells() {
                return Err(ExportError::InvalidGrid(format!(
                    "global grid has {} active cells, collector expects {}",
                    topology.grid.num_cells(),
                    collector.num_global_cells()
                )));
            }
            let executor: Box<dyn TaskExecutor> = if config.enable_async_output {
                Box::new(WorkerExecutor::spawn("result-writer")?)
            } else {
                Box::new(InlineExecutor::new())
            };
            RoleState::IoRank(IoRankState { topology, executor })
        } else {
            RoleState::Compute
        };
        Ok(Self {
            config,
            collector,
            module,
            backend,
            role,
        })
    }

    pub fn role(&self) -> Role {
        match self.role {
            RoleState::Compute => Role::Compute,
            RoleState::IoRank(_) => Role::IoRank,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn collector(&self) -> &D {
        &self.collector
    }

    /// Whether step writes run on a background thread.
    pub fn is_async(&self) -> bool {
        match &self.role {
            RoleState::IoRank(io) => io.executor.is_async(),
            RoleState::Compute => false,
        }
    }

    fn backend(&self) -> Result<Arc<dyn PersistenceBackend>, ExportError> {
        self.backend
            .clone()
            .ok_or(ExportError::BackendUnavailable("file-output"))
    }

    /// Write the initial-state record. A no-op on compute ranks.
    pub fn write_init(&mut self) -> Result<(), ExportError> {
        let backend = self.backend()?;
        let RoleState::IoRank(io) = &self.role else {
            return Ok(());
        };
        let state = build_initial_state(&io.topology, &self.collector)?;
        backend.write_initial_state(&state)?;
        log::info!(
            "wrote initial state: {} fields, {} NNCs",
            state.fields.len(),
            state.nnc.len()
        );
        Ok(())
    }

    /// Extract, collect and write the current step.
    ///
    /// Collective when distributed. The record is written as episode
    /// `sim.episode_index() + 1`. Without async output the write has
    /// completed when this returns; with it, any failure of the previous
    /// job is reported here.
    pub fn write_step<S: SimulatorView>(
        &mut self,
        sim: &S,
        step: StepInput<'_>,
    ) -> Result<(), ExportError> {
        let backend = self.backend()?;
        let episode = sim.episode_index() + 1;
        let is_io = matches!(self.role, RoleState::IoRank(_));

        if let Err(e) = self.extract_all(sim, episode, step.is_substep, is_io) {
            // Peers are already inside the collection; fail it for all.
            return Err(if self.collector.is_parallel() {
                self.collector.abort_collect(e)
            } else {
                e
            });
        }
        self.module.emit_validation_log();

        let mut fields = FieldTable::new();
        let mut wells = step.wells.cloned().unwrap_or_default();
        if step.is_substep {
            self.module.build_aggregate_inputs(&mut fields);
        } else {
            self.module.build_field_table(&mut fields);
            self.module.attach_well_field_data(&mut wells, episode);
        }

        if self.collector.is_parallel() {
            self.collector
                .collect(&fields, self.module.block_observation_data(), &wells)?;
        }

        let RoleState::IoRank(io) = &mut self.role else {
            return Ok(());
        };
        let snapshot = build_step_snapshot(
            &self.module,
            &self.collector,
            &self.config,
            episode,
            &step,
            fields,
            wells,
        )?;
        submit_step(&mut *io.executor, backend, snapshot)
    }

    /// Load the restart record of the current episode into the module's
    /// buffers. Every rank loads for itself.
    pub fn begin_restart<S: SimulatorView>(
        &mut self,
        sim: &S,
    ) -> Result<RestartValues, ExportError> {
        let backend = self.backend()?;
        let episode = sim.episode_index();
        let n = sim.num_local_elements();
        self.module.allocate_buffers(n, episode, false, false);

        let catalog = RestartCatalog::for_physics(&sim.physics());
        let values = backend.load_restart(episode, &catalog, &ExtraKeys::standard())?;
        for local in 0..n {
            let global = self.collector.local_to_global(local)?;
            self.module.set_restart(&values.solution, local, global)?;
        }
        if matches!(self.role, RoleState::IoRank(_)) {
            log::info!(
                "restarted from episode {episode}: {} fields, {} extra arrays",
                values.solution.len(),
                values.extra.len()
            );
        }
        Ok(values)
    }

    /// Drain outstanding writes and shut down the background thread.
    pub fn finish(mut self) -> Result<(), ExportError> {
        self.drain()
    }

    fn drain(&mut self) -> Result<(), ExportError> {
        match &mut self.role {
            RoleState::IoRank(io) => io.executor.drain(),
            RoleState::Compute => Ok(()),
        }
    }

    fn extract_all<S: SimulatorView>(
        &mut self,
        sim: &S,
        episode: usize,
        substep: bool,
        log: bool,
    ) -> Result<(), ExportError> {
        let n = sim.num_local_elements();
        if n != self.collector.num_local_cells() {
            return Err(ExportError::BufferSizeMismatch {
                name: "local elements".into(),
                expected: self.collector.num_local_cells(),
                found: n,
            });
        }
        self.module.allocate_buffers(n, episode, substep, log);
        let mut ctx = ElementContext::default();
        for local in 0..n {
            ctx.local_index = local;
            ctx.global_index = self.collector.local_to_global(local)?;
            ctx.interior = self.collector.is_interior(local);
            sim.update_element(&mut ctx);
            self.module.extract(&ctx);
        }
        Ok(())
    }
}

impl<M: OutputModule, D: DataCollector> Drop for ExportWriter<M, D> {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            log::warn!("pending result write failed during shutdown: {e}");
        }
    }
}

/// Directional transmissibilities, ownership diagnostics and NNCs.
fn build_initial_state<D: DataCollector>(
    topology: &GlobalTopology,
    collector: &D,
) -> Result<InitialState, ExportError> {
    let parallel = collector.is_parallel();
    let trans = topology.trans.select(parallel)?;
    let extracted = extract_static_topology(&topology.grid, trans, &topology.declared_nnc)?;
    let mut integer_vectors = BTreeMap::new();
    if parallel {
        integer_vectors.insert(
            RANK_VECTOR_KEY.to_owned(),
            collector.global_ranks()?.to_vec(),
        );
    }
    Ok(InitialState {
        fields: extracted.trans.into_field_table(),
        integer_vectors,
        nnc: extracted.nnc,
    })
}

/// Assemble the I/O rank's record of one step from rank-global data.
fn build_step_snapshot<M: OutputModule, D: DataCollector>(
    module: &M,
    collector: &D,
    config: &ExportConfig,
    episode: usize,
    step: &StepInput<'_>,
    local_fields: FieldTable,
    local_wells: WellData,
) -> Result<StepSnapshot, ExportError> {
    let (cell_data, well_data, block_summary) = if collector.is_parallel() {
        (
            collector.global_field_table()?.clone(),
            collector.global_well_data()?.clone(),
            collector.global_block_data()?.clone(),
        )
    } else {
        (
            local_fields,
            local_wells,
            module.block_observation_data().clone(),
        )
    };

    let mut scalar_summary = BTreeMap::new();
    let mut region_summary = BTreeMap::new();
    module.build_summary_aggregates(
        &cell_data,
        &mut scalar_summary,
        &mut region_summary,
        step.is_substep,
    );
    // Substep records carry summaries only.
    let cell_data = if step.is_substep {
        FieldTable::new()
    } else {
        cell_data
    };
    if step.total_solver_time != 0.0 {
        scalar_summary.insert(SOLVER_TIME_KEY.to_owned(), step.total_solver_time);
    }
    let mut extra_restart = BTreeMap::new();
    if !step.is_substep {
        extra_restart.insert(ExtraKeys::NEXT_STEP.to_owned(), vec![step.next_step_size]);
    }

    Ok(StepSnapshot {
        episode_index: episode,
        is_substep: step.is_substep,
        seconds_elapsed: step.seconds_elapsed,
        cell_data,
        well_data,
        scalar_summary,
        region_summary,
        block_summary,
        extra_restart,
        double_precision: config.double_precision,
    })
}

/// Drain the previous job, then dispatch the new one.
fn submit_step(
    executor: &mut dyn TaskExecutor,
    backend: Arc<dyn PersistenceBackend>,
    snapshot: StepSnapshot,
) -> Result<(), ExportError> {
    executor.drain()?;
    log::debug!("dispatching episode {}", snapshot.episode_index);
    executor.dispatch(Box::new(WriteStepJob::new(backend, snapshot)))?;
    if !executor.is_async() {
        executor.drain()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::collect::CollectToIoRank;
    use crate::algs::transmissibility::UniformTransmissibility;
    use crate::data::restart::PhysicalConfig;
    use crate::io::memory::MemoryBackend;
    use crate::output::context::IntensiveQuantities;
    use crate::output::module::StandardOutputModule;
    use crate::topology::cartesian::CartesianDims;

    struct Flat {
        episode: usize,
        pressure: f64,
    }

    impl SimulatorView for Flat {
        fn episode_index(&self) -> usize {
            self.episode
        }
        fn num_local_elements(&self) -> usize {
            4
        }
        fn update_element(&self, ctx: &mut ElementContext) {
            ctx.quantities = IntensiveQuantities {
                pressure: self.pressure + ctx.global_index as f64,
                saturation_water: 0.25,
                saturation_oil: 0.75,
                pore_volume: 1.0,
                ..IntensiveQuantities::default()
            };
        }
        fn physics(&self) -> PhysicalConfig {
            PhysicalConfig::default()
        }
    }

    fn writer(
        backend: Arc<MemoryBackend>,
        async_output: bool,
    ) -> ExportWriter<StandardOutputModule, CollectToIoRank<crate::algs::communicator::NoComm>> {
        let dims = CartesianDims::new(2, 2, 1).unwrap();
        let topology = GlobalTopology::new(
            GlobalGrid::structured(dims).unwrap(),
            TransmissibilitySource::sequential(Arc::new(UniformTransmissibility(1.0))),
        );
        ExportWriter::initialize(
            ExportConfig::default().with_async_output(async_output),
            CollectToIoRank::serial(4),
            StandardOutputModule::new(PhysicalConfig::default()),
            topology,
            Some(backend),
        )
        .unwrap()
    }

    #[test]
    fn serial_writer_is_io_rank() {
        let w = writer(Arc::new(MemoryBackend::new()), false);
        assert_eq!(w.role(), Role::IoRank);
        assert!(!w.is_async());
    }

    #[test]
    fn step_extras_follow_substep_flag() {
        let backend = Arc::new(MemoryBackend::new());
        let mut w = writer(backend.clone(), false);
        let sim = Flat {
            episode: 0,
            pressure: 100.0,
        };
        w.write_step(
            &sim,
            StepInput {
                seconds_elapsed: 10.0,
                total_solver_time: 2.5,
                next_step_size: 86400.0,
                ..StepInput::default()
            },
        )
        .unwrap();
        w.write_step(
            &sim,
            StepInput {
                is_substep: true,
                ..StepInput::default()
            },
        )
        .unwrap();
        let steps = backend.steps();
        assert_eq!(steps[0].extra_restart["OPMEXTRA"], vec![86400.0]);
        assert_eq!(steps[0].scalar_summary["TCPU"], 2.5);
        assert_eq!(steps[0].cell_data["PRESSURE"].data, vec![100.0, 101.0, 102.0, 103.0]);
        assert!(steps[1].extra_restart.is_empty());
        assert!(steps[1].cell_data.is_empty());
        assert!(!steps[1].scalar_summary.contains_key("TCPU"));
        assert_eq!(steps[1].scalar_summary["FPR"], 101.5);
        assert_eq!(steps[1].scalar_summary["FSWAT"], 0.25);
    }

    #[test]
    fn init_has_no_rank_vector_on_one_rank() {
        let backend = Arc::new(MemoryBackend::new());
        let mut w = writer(backend.clone(), true);
        w.write_init().unwrap();
        let init = backend.initial_state().unwrap();
        assert!(init.integer_vectors.is_empty());
        assert_eq!(init.fields["TRANX"].data, vec![1.0, 0.0, 1.0, 0.0]);
        assert!(init.nnc.is_empty());
        w.finish().unwrap();
    }
}
