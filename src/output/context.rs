//! What the export writer needs to see of the running simulator.

use crate::data::restart::PhysicalConfig;

/// Per-element intensive quantities after a stencil update.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IntensiveQuantities {
    pub pressure: f64,
    pub temperature: f64,
    pub saturation_water: f64,
    pub saturation_oil: f64,
    pub saturation_gas: f64,
    pub rs: f64,
    pub rv: f64,
    pub pore_volume: f64,
    /// Historical maximum oil saturation (vaporization limiting).
    pub max_oil_saturation: f64,
    pub hysteresis: HysteresisParams,
}

/// Scanning-curve parameters of the hysteretic saturation functions.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HysteresisParams {
    pub pcswm_ow: f64,
    pub krnsw_ow: f64,
    pub pcswm_go: f64,
    pub krnsw_go: f64,
}

/// Reusable per-element scratch space, refreshed for each visited element.
#[derive(Clone, Debug, Default)]
pub struct ElementContext {
    pub local_index: usize,
    pub global_index: usize,
    /// Owned by this rank; ghost copies are `false`.
    pub interior: bool,
    pub quantities: IntensiveQuantities,
}

/// The slice of the simulator the output path reads from.
pub trait SimulatorView {
    /// Zero-based index of the current report step.
    fn episode_index(&self) -> usize;
    /// Elements of the local (distributed) grid, interior and ghost.
    fn num_local_elements(&self) -> usize;
    /// Refresh `ctx.quantities` for the element `ctx.local_index`.
    fn update_element(&self, ctx: &mut ElementContext);
    /// Physics switches active for this run.
    fn physics(&self) -> PhysicalConfig;
}
