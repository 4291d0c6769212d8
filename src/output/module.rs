//! Per-step output buffers filled from live solver state.
//!
//! [`OutputModule`] is the seam between the solver and the export writer:
//! the writer allocates buffers, feeds every local element through
//! [`OutputModule::extract`], and then asks for named field arrays, well
//! columns, block observations and summary aggregates.
//! [`StandardOutputModule`] is the black-oil implementation.

use crate::data::block::BlockData;
use crate::data::field::{CellData, FieldTable, Measure, TargetType};
use crate::data::restart::PhysicalConfig;
use crate::data::wells::WellData;
use crate::export_error::ExportError;
use crate::output::context::{ElementContext, IntensiveQuantities};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Field Buffer Module contract.
pub trait OutputModule {
    /// Size the buffers for `num_elements` local elements of this episode.
    fn allocate_buffers(&mut self, num_elements: usize, episode: usize, substep: bool, log: bool);
    /// Record one element's quantities.
    fn extract(&mut self, ctx: &ElementContext);
    /// Emit (once) the validation anomalies counted since allocation.
    fn emit_validation_log(&mut self);
    /// Named cell arrays over the local elements.
    fn build_field_table(&self, out: &mut FieldTable);
    /// The subset of [`build_field_table`](Self::build_field_table) that
    /// summary aggregates read. Substeps collect only these.
    fn build_aggregate_inputs(&self, out: &mut FieldTable);
    /// Formation-test columns for connections in locally present cells.
    fn attach_well_field_data(&self, wells: &mut WellData, episode: usize);
    /// Field-wide scalars and per-region arrays from a rank-global table.
    fn build_summary_aggregates(
        &self,
        table: &FieldTable,
        scalars: &mut BTreeMap<String, f64>,
        regions: &mut BTreeMap<String, Vec<f64>>,
        substep: bool,
    );
    /// Block observations sampled on interior elements during extraction.
    fn block_observation_data(&self) -> &BlockData;
    /// Copy restart values for global cell `global` into local slot `local`.
    fn set_restart(
        &mut self,
        solution: &FieldTable,
        local: usize,
        global: usize,
    ) -> Result<(), ExportError>;
}

struct FieldDef {
    name: &'static str,
    measure: Measure,
    target: TargetType,
    enabled: fn(&PhysicalConfig) -> bool,
    value: fn(&IntensiveQuantities) -> f64,
}

const FIELDS: &[FieldDef] = &[
    FieldDef {
        name: "PRESSURE",
        measure: Measure::Pressure,
        target: TargetType::RestartSolution,
        enabled: |_| true,
        value: |q| q.pressure,
    },
    FieldDef {
        name: "TEMP",
        measure: Measure::Temperature,
        target: TargetType::RestartSolution,
        enabled: |_| true,
        value: |q| q.temperature,
    },
    FieldDef {
        name: "SWAT",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.water_active,
        value: |q| q.saturation_water,
    },
    FieldDef {
        name: "SGAS",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.gas_active,
        value: |q| q.saturation_gas,
    },
    FieldDef {
        name: "RS",
        measure: Measure::GasOilRatio,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_dissolved_gas,
        value: |q| q.rs,
    },
    FieldDef {
        name: "RV",
        measure: Measure::OilGasRatio,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_vaporized_oil,
        value: |q| q.rv,
    },
    FieldDef {
        name: "SOMAX",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.vappars_active,
        value: |q| q.max_oil_saturation,
    },
    FieldDef {
        name: "PCSWM_OW",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_hysteresis,
        value: |q| q.hysteresis.pcswm_ow,
    },
    FieldDef {
        name: "KRNSW_OW",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_hysteresis,
        value: |q| q.hysteresis.krnsw_ow,
    },
    FieldDef {
        name: "PCSWM_GO",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_hysteresis,
        value: |q| q.hysteresis.pcswm_go,
    },
    FieldDef {
        name: "KRNSW_GO",
        measure: Measure::Identity,
        target: TargetType::RestartSolution,
        enabled: |p| p.enable_hysteresis,
        value: |q| q.hysteresis.krnsw_go,
    },
    FieldDef {
        name: "PORV",
        measure: Measure::Volume,
        target: TargetType::RestartAuxiliary,
        enabled: |_| true,
        value: |q| q.pore_volume,
    },
];

/// Arrays read by [`OutputModule::build_summary_aggregates`].
const AGGREGATE_INPUTS: &[&str] = &["PRESSURE", "SWAT", "SGAS", "PORV"];

fn block_value(keyword: &str, q: &IntensiveQuantities) -> Option<f64> {
    match keyword {
        "BPR" => Some(q.pressure),
        "BSWAT" => Some(q.saturation_water),
        "BSGAS" => Some(q.saturation_gas),
        "BTEMP" => Some(q.temperature),
        _ => None,
    }
}

/// Anomalies seen during one extraction pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationCounts {
    pub saturation_out_of_range: usize,
    pub non_positive_pressure: usize,
    pub non_finite: usize,
    /// Global index of the first offending cell.
    pub first_cell: Option<usize>,
}

impl ValidationCounts {
    pub fn is_clean(&self) -> bool {
        self.saturation_out_of_range == 0 && self.non_positive_pressure == 0 && self.non_finite == 0
    }

    fn check(&mut self, global: usize, q: &IntensiveQuantities) {
        let sats = [q.saturation_water, q.saturation_oil, q.saturation_gas];
        let bad_saturation = sats.iter().any(|s| s.is_finite() && !(0.0..=1.0).contains(s));
        let bad_pressure = q.pressure.is_finite() && q.pressure <= 0.0;
        let non_finite = !(q.pressure.is_finite() && sats.iter().all(|s| s.is_finite()));
        self.saturation_out_of_range += usize::from(bad_saturation);
        self.non_positive_pressure += usize::from(bad_pressure);
        self.non_finite += usize::from(non_finite);
        if bad_saturation || bad_pressure || non_finite {
            self.first_cell.get_or_insert(global);
        }
    }
}

/// Black-oil [`OutputModule`].
#[derive(Clone, Debug)]
pub struct StandardOutputModule {
    physics: PhysicalConfig,
    block_requests: Vec<(String, usize)>,
    fip_regions: Option<Vec<usize>>,
    rft: BTreeMap<usize, BTreeSet<String>>,
    buffers: BTreeMap<&'static str, Vec<f64>>,
    /// Interior elements only.
    local_of_global: HashMap<usize, usize>,
    block: BlockData,
    validation: ValidationCounts,
    episode: usize,
    log: bool,
}

impl StandardOutputModule {
    pub fn new(physics: PhysicalConfig) -> Self {
        Self {
            physics,
            block_requests: Vec::new(),
            fip_regions: None,
            rft: BTreeMap::new(),
            buffers: BTreeMap::new(),
            local_of_global: HashMap::new(),
            block: BlockData::new(),
            validation: ValidationCounts::default(),
            episode: 0,
            log: false,
        }
    }

    /// Sample `keyword` (`BPR`, `BSWAT`, `BSGAS`, `BTEMP`) at a global cell.
    pub fn with_block_request(
        mut self,
        keyword: &str,
        global_cell: usize,
    ) -> Result<Self, ExportError> {
        if block_value(keyword, &IntensiveQuantities::default()).is_none() {
            return Err(ExportError::UnsupportedKeyword(keyword.to_owned()));
        }
        self.block_requests.push((keyword.to_owned(), global_cell));
        Ok(self)
    }

    /// FIP region (0-based) of every global cell, for `RPR` arrays.
    pub fn with_fip_regions(mut self, regions: Vec<usize>) -> Self {
        self.fip_regions = Some(regions);
        self
    }

    /// Request formation-test data for `well` at report step `episode`.
    pub fn with_rft(mut self, episode: usize, well: &str) -> Self {
        self.rft.entry(episode).or_default().insert(well.to_owned());
        self
    }

    pub fn physics(&self) -> &PhysicalConfig {
        &self.physics
    }

    /// Current contents of a named buffer.
    pub fn buffer(&self, name: &str) -> Option<&[f64]> {
        self.buffers.get(name).map(Vec::as_slice)
    }

    pub fn validation(&self) -> &ValidationCounts {
        &self.validation
    }
}

impl OutputModule for StandardOutputModule {
    fn allocate_buffers(&mut self, num_elements: usize, episode: usize, substep: bool, log: bool) {
        self.buffers = FIELDS
            .iter()
            .filter(|f| (f.enabled)(&self.physics))
            .map(|f| (f.name, vec![0.0; num_elements]))
            .collect();
        self.local_of_global.clear();
        self.local_of_global.reserve(num_elements);
        self.block.clear();
        self.validation = ValidationCounts::default();
        self.episode = episode;
        self.log = log;
        if log {
            log::debug!(
                "allocated {} output buffers of {num_elements} elements (episode {episode}{})",
                self.buffers.len(),
                if substep { ", substep" } else { "" }
            );
        }
    }

    fn extract(&mut self, ctx: &ElementContext) {
        let q = &ctx.quantities;
        for field in FIELDS {
            if let Some(buf) = self.buffers.get_mut(field.name) {
                buf[ctx.local_index] = (field.value)(q);
            }
        }
        self.validation.check(ctx.global_index, q);
        if !ctx.interior {
            return;
        }
        self.local_of_global.insert(ctx.global_index, ctx.local_index);
        for (keyword, cell) in &self.block_requests {
            if *cell == ctx.global_index {
                if let Some(v) = block_value(keyword, q) {
                    self.block.insert(keyword.as_str(), *cell, v);
                }
            }
        }
    }

    fn emit_validation_log(&mut self) {
        let counts = std::mem::take(&mut self.validation);
        if !self.log || counts.is_clean() {
            return;
        }
        let first = counts.first_cell.unwrap_or_default();
        if counts.saturation_out_of_range > 0 {
            log::warn!(
                "episode {}: {} cells with saturation outside [0, 1] (first: cell {first})",
                self.episode,
                counts.saturation_out_of_range
            );
        }
        if counts.non_positive_pressure > 0 {
            log::warn!(
                "episode {}: {} cells with non-positive pressure (first: cell {first})",
                self.episode,
                counts.non_positive_pressure
            );
        }
        if counts.non_finite > 0 {
            log::warn!(
                "episode {}: {} cells with non-finite pressure or saturation (first: cell {first})",
                self.episode,
                counts.non_finite
            );
        }
    }

    fn build_field_table(&self, out: &mut FieldTable) {
        for field in FIELDS {
            if let Some(buf) = self.buffers.get(field.name) {
                out.insert(
                    field.name.to_owned(),
                    CellData::new(field.measure, buf.clone(), field.target),
                );
            }
        }
    }

    fn build_aggregate_inputs(&self, out: &mut FieldTable) {
        let mut all = FieldTable::new();
        self.build_field_table(&mut all);
        out.extend(
            all.into_iter()
                .filter(|(name, _)| AGGREGATE_INPUTS.contains(&name.as_str())),
        );
    }

    fn attach_well_field_data(&self, wells: &mut WellData, episode: usize) {
        let Some(requested) = self.rft.get(&episode) else {
            return;
        };
        let pressure = self.buffer("PRESSURE");
        let swat = self.buffer("SWAT");
        let sgas = self.buffer("SGAS");
        for (name, well) in wells.wells.iter_mut() {
            if !requested.contains(name) {
                continue;
            }
            for conn in &mut well.connections {
                let Some(&local) = self.local_of_global.get(&conn.cell) else {
                    continue;
                };
                conn.cell_pressure = pressure.map(|b| b[local]);
                conn.cell_saturation_water = swat.map(|b| b[local]);
                conn.cell_saturation_gas = sgas.map(|b| b[local]);
            }
        }
    }

    fn build_summary_aggregates(
        &self,
        table: &FieldTable,
        scalars: &mut BTreeMap<String, f64>,
        regions: &mut BTreeMap<String, Vec<f64>>,
        substep: bool,
    ) {
        let Some(pressure) = table.get("PRESSURE") else {
            return;
        };
        let n = pressure.len();
        let weight = |i: usize| table.get("PORV").map_or(1.0, |pv| pv.data[i]);
        let total: f64 = (0..n).map(weight).sum();
        if total <= 0.0 {
            return;
        }
        let average = |field: &CellData| {
            (0..n).map(|i| weight(i) * field.data[i]).sum::<f64>() / total
        };

        scalars.insert("FPR".into(), average(pressure));
        for (field, keyword) in [("SWAT", "FSWAT"), ("SGAS", "FSGAS")] {
            if let Some(cell) = table.get(field) {
                scalars.insert(keyword.into(), average(cell));
            }
        }

        if let Some(fip) = self.fip_regions.as_ref().filter(|r| r.len() == n) {
            let n_regions = fip.iter().max().map_or(0, |m| m + 1);
            let mut pv = vec![0.0; n_regions];
            let mut rpr = vec![0.0; n_regions];
            for (i, &r) in fip.iter().enumerate() {
                pv[r] += weight(i);
                rpr[r] += weight(i) * pressure.data[i];
            }
            for (p, w) in rpr.iter_mut().zip(&pv) {
                if *w > 0.0 {
                    *p /= w;
                }
            }
            regions.insert("RPR".into(), rpr);
        }

        if !substep {
            log::debug!("field average pressure {:.4}", scalars["FPR"]);
        }
    }

    fn block_observation_data(&self) -> &BlockData {
        &self.block
    }

    fn set_restart(
        &mut self,
        solution: &FieldTable,
        local: usize,
        global: usize,
    ) -> Result<(), ExportError> {
        for (name, buf) in self.buffers.iter_mut() {
            let Some(cell) = solution.get(*name) else {
                continue;
            };
            let value = *cell.data.get(global).ok_or(ExportError::CellOutOfRange {
                cell: global,
                size: cell.len(),
            })?;
            let slot = buf.get_mut(local).ok_or(ExportError::CellOutOfRange {
                cell: local,
                size: cell.len(),
            })?;
            *slot = value;
        }
        Ok(())
    }
}
