//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use reservoir_export::data::restart::{ExtraKeys, RestartCatalog, RestartValues};
use reservoir_export::io::{InitialState, PersistenceBackend};
use reservoir_export::output::StepSnapshot;
use reservoir_export::prelude::*;
use std::sync::Arc;

/// A simulator whose cell state is a function of the global cell index.
#[derive(Clone, Debug)]
pub struct FieldSim {
    pub episode: usize,
    pub local_to_global: Vec<usize>,
    pub base_pressure: f64,
    pub physics: PhysicalConfig,
}

impl FieldSim {
    pub fn serial(num_cells: usize, episode: usize) -> Self {
        Self::on_cells((0..num_cells).collect(), episode)
    }

    pub fn on_cells(local_to_global: Vec<usize>, episode: usize) -> Self {
        Self {
            episode,
            local_to_global,
            base_pressure: 200.0,
            physics: PhysicalConfig::default(),
        }
    }

    pub fn pressure_of(&self, global: usize) -> f64 {
        self.base_pressure + 10.0 * global as f64
    }
}

impl SimulatorView for FieldSim {
    fn episode_index(&self) -> usize {
        self.episode
    }

    fn num_local_elements(&self) -> usize {
        self.local_to_global.len()
    }

    fn update_element(&self, ctx: &mut ElementContext) {
        let g = ctx.global_index;
        let sw = 0.1 + 0.05 * (g % 4) as f64;
        ctx.quantities = IntensiveQuantities {
            pressure: self.pressure_of(g),
            temperature: 350.0,
            saturation_water: sw,
            saturation_gas: 0.1,
            saturation_oil: 0.9 - sw,
            rs: 50.0 + g as f64,
            pore_volume: 1.0 + g as f64,
            ..IntensiveQuantities::default()
        };
    }

    fn physics(&self) -> PhysicalConfig {
        self.physics
    }
}

/// 3×2×1 box over three ranks: (local-to-global, interior mask) per rank.
/// Every rank also holds ghost copies of its neighbours' boundary cells.
pub fn three_rank_layout() -> Vec<(Vec<usize>, Vec<bool>)> {
    vec![
        (vec![0, 1, 2], vec![true, true, false]),
        (vec![1, 2, 3, 4], vec![false, true, true, false]),
        (vec![3, 4, 5], vec![false, true, true]),
    ]
}

/// Structured topology with every face transmissibility equal to `trans`.
pub fn uniform_topology(nx: usize, ny: usize, nz: usize, trans: f64) -> GlobalTopology {
    let dims = CartesianDims::new(nx, ny, nz).unwrap();
    GlobalTopology::new(
        GlobalGrid::structured(dims).unwrap(),
        TransmissibilitySource::sequential(Arc::new(UniformTransmissibility(trans))),
    )
}

pub fn step(next_step_size: f64) -> StepInput<'static> {
    StepInput {
        seconds_elapsed: 86400.0,
        next_step_size,
        ..StepInput::default()
    }
}

/// Memory backend whose step writes block until [`GateBackend::open`].
#[derive(Default)]
pub struct GateBackend {
    pub inner: MemoryBackend,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GateBackend {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }
}

impl PersistenceBackend for GateBackend {
    fn write_initial_state(&self, state: &InitialState) -> Result<(), ExportError> {
        self.inner.write_initial_state(state)
    }

    fn write_time_step(&self, snapshot: &StepSnapshot) -> Result<(), ExportError> {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        drop(open);
        self.inner.write_time_step(snapshot)
    }

    fn load_restart(
        &self,
        episode: usize,
        catalog: &RestartCatalog,
        extra: &ExtraKeys,
    ) -> Result<RestartValues, ExportError> {
        self.inner.load_restart(episode, catalog, extra)
    }
}

/// Memory backend that sleeps before every step write.
pub struct SlowBackend {
    pub inner: MemoryBackend,
    pub delay: std::time::Duration,
}

impl PersistenceBackend for SlowBackend {
    fn write_initial_state(&self, state: &InitialState) -> Result<(), ExportError> {
        self.inner.write_initial_state(state)
    }

    fn write_time_step(&self, snapshot: &StepSnapshot) -> Result<(), ExportError> {
        std::thread::sleep(self.delay);
        self.inner.write_time_step(snapshot)
    }

    fn load_restart(
        &self,
        episode: usize,
        catalog: &RestartCatalog,
        extra: &ExtraKeys,
    ) -> Result<RestartValues, ExportError> {
        self.inner.load_restart(episode, catalog, extra)
    }
}
